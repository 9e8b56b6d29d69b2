use bytes::BytesMut;

use crate::error::FrameError;

/// Default bound on unterminated text: 4 KiB.
pub const DEFAULT_MAX_LINE_LEN: usize = 4 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Configuration for the line reassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReassemblerConfig {
    /// Longest line kept, newline excluded. Default: 4 KiB.
    pub max_line_len: usize,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

/// Output of one [`LineReassembler::feed`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reassembled {
    /// Completed lines in arrival order, each ending in `\n`. A line longer
    /// than the bound is dropped and appears as [`FrameError::LineTooLong`]
    /// once its newline arrives.
    pub lines: Vec<Result<String, FrameError>>,
}

impl Reassembled {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Accumulates raw chunks and yields newline-terminated lines.
///
/// Chunk boundaries carry no meaning: any split of the same bytes yields the
/// same lines, overlong lines included. Decoding is UTF-8 with replacement,
/// applied to whole lines so a multi-byte character split across chunks
/// survives.
#[derive(Debug)]
pub struct LineReassembler {
    buf: BytesMut,
    config: ReassemblerConfig,
    /// Bytes of an overlong line dropped so far, while waiting for its end.
    skipped: Option<usize>,
}

impl LineReassembler {
    /// Create a reassembler with default configuration.
    pub fn new() -> Self {
        Self::with_config(ReassemblerConfig::default())
    }

    /// Create a reassembler with explicit configuration.
    pub fn with_config(config: ReassemblerConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            skipped: None,
        }
    }

    /// Append a chunk and split out every completed line.
    pub fn feed(&mut self, chunk: &[u8]) -> Reassembled {
        let mut out = Reassembled::default();
        let mut rest = chunk;

        if let Some(skipped) = self.skipped {
            let Some(at) = rest.iter().position(|&b| b == b'\n') else {
                self.skipped = Some(skipped + rest.len());
                return out;
            };
            self.skipped = None;
            out.lines.push(Err(self.too_long(skipped + at + 1)));
            rest = &rest[at + 1..];
        }

        let mut search_from = self.buf.len();
        self.buf.extend_from_slice(rest);

        while let Some(rel) = self.buf[search_from..].iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(search_from + rel + 1);
            if line.len() - 1 > self.config.max_line_len {
                out.lines.push(Err(self.too_long(line.len())));
            } else {
                out.lines.push(Ok(String::from_utf8_lossy(&line).into_owned()));
            }
            search_from = 0;
        }

        if self.buf.len() > self.config.max_line_len {
            tracing::debug!(
                len = self.buf.len(),
                max = self.config.max_line_len,
                "skipping to end of overlong line"
            );
            self.skipped = Some(self.buf.len());
            self.buf.clear();
        }

        out
    }

    fn too_long(&self, len: usize) -> FrameError {
        tracing::warn!(len, max = self.config.max_line_len, "dropping overlong line");
        FrameError::LineTooLong {
            len,
            max: self.config.max_line_len,
        }
    }

    /// Bytes received since the last newline. Empty while an overlong line
    /// is being skipped.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Drop any unterminated tail, including an overlong line in progress.
    /// Returns how many bytes were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.buf.len() + self.skipped.take().unwrap_or(0);
        self.buf.clear();
        dropped
    }

    /// Current configuration.
    pub fn config(&self) -> &ReassemblerConfig {
        &self.config
    }
}

impl Default for LineReassembler {
    fn default() -> Self {
        Self::new()
    }
}
