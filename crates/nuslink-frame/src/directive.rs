//! Transfer sentinel detection.
//!
//! The peripheral announces a binary transfer with a text line of the form
//! `Sending file: <filename>,<declared_size>`. Diagnostic text may precede
//! the marker on the same line.

use crate::error::{FrameError, Result};

/// Literal marker that introduces a transfer directive.
pub const SENTINEL: &str = "Sending file:";

/// A parsed transfer announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlDirective {
    /// Final path component of the announced name.
    pub filename: String,
    /// Number of payload bytes that will follow.
    pub declared_size: u64,
}

/// Inspect one completed line for a transfer directive.
///
/// Returns `Ok(None)` for ordinary text, `Ok(Some(_))` for a well-formed
/// directive and `Err` when the marker is present but the rest is unusable.
/// Callers treat the error case as ordinary text.
pub fn detect(line: &str) -> Result<Option<ControlDirective>> {
    let Some(at) = line.find(SENTINEL) else {
        return Ok(None);
    };

    let payload = &line[at + SENTINEL.len()..];
    let (name, size) = payload
        .split_once(',')
        .ok_or_else(|| FrameError::MalformedDirective(payload.trim().to_string()))?;

    let size = size.trim();
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FrameError::InvalidSize(size.to_string()));
    }
    let declared_size = size
        .parse::<u64>()
        .map_err(|_| FrameError::InvalidSize(size.to_string()))?;

    let filename = sanitize_filename(name)?;

    Ok(Some(ControlDirective {
        filename,
        declared_size,
    }))
}

/// Trim whitespace and strip every path component, keeping the last one.
///
/// Both `/` and `\` count as separators since the peripheral firmware may
/// use either. Names that reduce to nothing, `.` or `..` are rejected.
pub fn sanitize_filename(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let name = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return Err(FrameError::InvalidFilename(trimmed.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_well_formed_directive() {
        let directive = detect("Sending file: calib.bin,2048\n").unwrap().unwrap();
        assert_eq!(
            directive,
            ControlDirective {
                filename: "calib.bin".to_string(),
                declared_size: 2048,
            }
        );
    }

    #[test]
    fn trims_whitespace_and_crlf() {
        let directive = detect("Sending file:   raw_data.bin ,  1500 \r\n")
            .unwrap()
            .unwrap();
        assert_eq!(directive.filename, "raw_data.bin");
        assert_eq!(directive.declared_size, 1500);
    }

    #[test]
    fn marker_may_follow_other_text() {
        let directive = detect("[00:01:02] Sending file: log.bin,10\n")
            .unwrap()
            .unwrap();
        assert_eq!(directive.filename, "log.bin");
        assert_eq!(directive.declared_size, 10);
    }

    #[test]
    fn ordinary_text_is_not_a_directive() {
        assert_eq!(detect("adxl: 1,2,3\n").unwrap(), None);
        assert_eq!(detect("sending file: lowercase.bin,1\n").unwrap(), None);
    }

    #[test]
    fn missing_comma_is_malformed() {
        let err = detect("Sending file: badsize\n").unwrap_err();
        assert_eq!(err, FrameError::MalformedDirective("badsize".to_string()));
    }

    #[test]
    fn non_numeric_or_negative_size_is_rejected() {
        for line in [
            "Sending file: a.bin,12kb\n",
            "Sending file: a.bin,-5\n",
            "Sending file: a.bin,\n",
            "Sending file: a.bin,+5\n",
            "Sending file: a.bin,99999999999999999999999\n",
        ] {
            assert!(
                matches!(detect(line), Err(FrameError::InvalidSize(_))),
                "{line:?}"
            );
        }
    }

    #[test]
    fn zero_size_is_allowed() {
        let directive = detect("Sending file: empty.bin,0\n").unwrap().unwrap();
        assert_eq!(directive.declared_size, 0);
    }

    #[test]
    fn strips_path_components() {
        let directive = detect("Sending file: ../../etc/passwd,4\n").unwrap().unwrap();
        assert_eq!(directive.filename, "passwd");

        let directive = detect("Sending file: C:\\logs\\run 7.bin,4\n")
            .unwrap()
            .unwrap();
        assert_eq!(directive.filename, "run 7.bin");
    }

    #[test]
    fn rejects_names_without_a_final_component() {
        for name in ["", "  ", "dir/", "..", "a/.."] {
            let line = format!("Sending file: {name},4\n");
            assert!(
                matches!(detect(&line), Err(FrameError::InvalidFilename(_))),
                "{line:?}"
            );
        }
    }
}
