use std::fs;
use std::io::{self, Read};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use nuslink_frame::SENTINEL;
use nuslink_session::{
    channel, pump, Dispatcher, Event, EventLoop, EventSender, SessionConfig, TransferOutcome,
    TransferReport,
};
use nuslink_transport::{CommandSink, DirectoryStore, DiscardSink, FileStore};
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, ReceiveArgs};
use crate::exit::{io_error, store_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_console_line, print_reports, OutputFormat};

/// Bytes requested per read from a live bridge socket.
const SOCKET_READ_SIZE: usize = 4096;

pub fn run(args: ReceiveArgs, format: OutputFormat) -> CliResult<i32> {
    let config = SessionConfig {
        watchdog_timeout: parse_duration(&args.timeout)?,
        console_capacity: args.max_lines,
        max_line_len: args.max_line_len,
        overrun_policy: args.overrun_policy.into(),
        ..SessionConfig::default()
    };
    let store = DirectoryStore::new(&args.out_dir)
        .map_err(|err| store_error("cannot use output directory", err))?;

    let (sender, events) = channel();
    install_ctrlc_handler(sender.clone())?;

    let reports = if let Some(path) = &args.replay {
        let data = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        let chunk_size = usize::try_from(args.chunk_size).unwrap_or(usize::MAX);
        let delay = args
            .chunk_delay
            .as_deref()
            .map(parse_duration)
            .transpose()?;
        info!(path = %path.display(), bytes = data.len(), chunk_size, "replaying capture");

        let source = ReplaySource::new(data, chunk_size, delay);
        spawn_pump(source, sender, chunk_size)?;
        let dispatcher = Dispatcher::new(DiscardSink::new(), store, config);
        drive(dispatcher, events, &args, format).1
    } else if let Some(path) = &args.socket {
        receive_from_bridge(path, sender, events, store, config, &args, format)?
    } else {
        return Err(CliError::new(USAGE, "provide --socket or --replay"));
    };

    print_reports(&reports, format);

    let failed = reports
        .iter()
        .any(|report| matches!(report.outcome, TransferOutcome::Aborted { .. }));
    let incomplete = args.exit_after_transfer && !reports.iter().any(TransferReport::is_complete);
    Ok(if failed || incomplete { FAILURE } else { SUCCESS })
}

#[cfg(unix)]
fn receive_from_bridge(
    path: &std::path::Path,
    sender: EventSender,
    events: Receiver<Event>,
    store: DirectoryStore,
    config: SessionConfig,
    args: &ReceiveArgs,
    format: OutputFormat,
) -> CliResult<Vec<TransferReport>> {
    use nuslink_transport::{BridgeStream, StreamSink};

    use crate::exit::transport_error;

    let stream = BridgeStream::connect(path).map_err(|err| transport_error("connect failed", err))?;
    let reader = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;
    spawn_pump(reader, sender, SOCKET_READ_SIZE)?;

    let dispatcher = Dispatcher::new(StreamSink::new(stream), store, config);
    let (commands, reports) = drive(dispatcher, events, args, format);
    if let Some(stream) = commands.get_ref() {
        if let Err(err) = stream.shutdown() {
            debug!(error = %err, "bridge shutdown failed");
        }
    }
    Ok(reports)
}

#[cfg(not(unix))]
fn receive_from_bridge(
    _path: &std::path::Path,
    _sender: EventSender,
    _events: Receiver<Event>,
    _store: DirectoryStore,
    _config: SessionConfig,
    _args: &ReceiveArgs,
    _format: OutputFormat,
) -> CliResult<Vec<TransferReport>> {
    Err(CliError::new(USAGE, "bridge sockets require a Unix platform"))
}

fn drive<C: CommandSink, S: FileStore>(
    dispatcher: Dispatcher<C, S>,
    events: Receiver<Event>,
    args: &ReceiveArgs,
    format: OutputFormat,
) -> (C, Vec<TransferReport>) {
    let mut event_loop = EventLoop::new(dispatcher, events).exit_on_disconnect();
    if args.exit_after_transfer {
        event_loop = event_loop.stop_after_transfers(1);
    }

    let handled = event_loop.run(|line| print_console_line(line, format));
    debug!(handled, "event loop finished");

    let (commands, _store, _console, reports) = event_loop.into_dispatcher().into_parts();
    (commands, reports)
}

fn spawn_pump<R>(reader: R, sender: EventSender, chunk_size: usize) -> CliResult<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("nuslink-link".into())
        .spawn(move || match pump(reader, &sender, chunk_size) {
            Ok(total) => debug!(total, "link reader finished"),
            Err(err) => warn!(error = %err, "link reader stopped"),
        })
        .map(|_| ())
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start link reader: {err}")))
}

fn install_ctrlc_handler(sender: EventSender) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let _ = sender.send(Event::Shutdown);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Replays a captured notification stream as a sequence of chunks.
///
/// A chunk never extends past the newline that ends a transfer sentinel, so
/// the payload that follows starts on a fresh chunk as it would from the
/// peripheral.
struct ReplaySource {
    data: Vec<u8>,
    pos: usize,
    chunk_size: usize,
    delay: Option<Duration>,
}

impl ReplaySource {
    fn new(data: Vec<u8>, chunk_size: usize, delay: Option<Duration>) -> Self {
        Self {
            data,
            pos: 0,
            chunk_size: chunk_size.max(1),
            delay,
        }
    }

    fn next_end(&self, limit: usize) -> usize {
        let end = (self.pos + limit).min(self.data.len());
        for idx in self.pos..end {
            if self.data[idx] != b'\n' {
                continue;
            }
            let line_start = self.data[..idx]
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |at| at + 1);
            if contains(&self.data[line_start..idx], SENTINEL.as_bytes()) {
                return idx + 1;
            }
        }
        end
    }
}

impl Read for ReplaySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() {
            return Ok(0);
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        let end = self.next_end(self.chunk_size.min(buf.len()));
        let len = end - self.pos;
        buf[..len].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(len)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
