//! Event loops that drive a [`Dispatcher`] from a queue.
//!
//! Producers (a socket reader, a replay file, a signal handler) only push
//! [`Event`]s. The loop is the single consumer; it also turns the pending
//! watchdog deadline into a [`Event::WatchdogExpired`] when nothing arrives in
//! time, so expiries are ordered with the byte chunks.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Instant;

use bytes::Bytes;
use nuslink_transport::{CommandSink, FileStore};
use tracing::{debug, trace};

use crate::dispatcher::Dispatcher;
use crate::error::{Result, SessionError};
use crate::event::Event;

/// Producer half of the event queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    pub fn send(&self, event: Event) -> Result<()> {
        self.tx.send(event).map_err(|_| SessionError::ChannelClosed)
    }

    /// Queue one chunk exactly as it was received.
    pub fn bytes(&self, chunk: impl Into<Bytes>) -> Result<()> {
        self.send(Event::Bytes(chunk.into()))
    }
}

/// Create an unbounded event queue.
pub fn channel() -> (EventSender, Receiver<Event>) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, rx)
}

/// Forward everything `reader` yields as byte events, then a disconnect.
///
/// Each successful `read` becomes one chunk; reads are never coalesced.
/// Returns the number of bytes forwarded. A read error still queues the
/// disconnect before it is returned.
pub fn pump<R: Read>(mut reader: R, sender: &EventSender, chunk_size: usize) -> Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                trace!(len = n, "chunk read");
                total += n as u64;
                sender.bytes(Bytes::copy_from_slice(&buf[..n]))?;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                // The loop may already be gone; the read error matters more.
                let _ = sender.send(Event::Disconnect);
                return Err(err.into());
            }
        }
    }

    debug!(total, "link reached end of stream");
    sender.send(Event::Disconnect)?;
    Ok(total)
}

/// Blocking single-consumer loop over a [`std::sync::mpsc`] queue.
#[derive(Debug)]
pub struct EventLoop<C, S> {
    dispatcher: Dispatcher<C, S>,
    events: Receiver<Event>,
    stop_after: Option<usize>,
    exit_on_disconnect: bool,
}

impl<C: CommandSink, S: FileStore> EventLoop<C, S> {
    pub fn new(dispatcher: Dispatcher<C, S>, events: Receiver<Event>) -> Self {
        Self {
            dispatcher,
            events,
            stop_after: None,
            exit_on_disconnect: false,
        }
    }

    /// Treat [`Event::Disconnect`] like [`Event::Shutdown`]: stop once the
    /// link is gone instead of waiting for a reconnect.
    pub fn exit_on_disconnect(mut self) -> Self {
        self.exit_on_disconnect = true;
        self
    }

    /// Stop once `count` transfers have terminated, whatever their outcome.
    pub fn stop_after_transfers(mut self, count: usize) -> Self {
        self.stop_after = Some(count);
        self
    }

    /// Run until [`Event::Shutdown`], the transfer limit, or every sender
    /// is dropped. Each appended console line is passed to `on_line`.
    ///
    /// Returns the number of events handled, synthesized expiries included.
    pub fn run<F: FnMut(&str)>(&mut self, mut on_line: F) -> usize {
        let mut handled = 0;

        loop {
            if self.limit_reached() {
                debug!(transfers = self.dispatcher.reports().len(), "transfer limit reached");
                break;
            }

            let Some(event) = self.next_event() else {
                debug!("event queue closed");
                for line in self.dispatcher.handle(Event::Disconnect, Instant::now()) {
                    on_line(&line);
                }
                break;
            };

            let stop = match event {
                Event::Shutdown => true,
                Event::Disconnect => self.exit_on_disconnect,
                _ => false,
            };
            for line in self.dispatcher.handle(event, Instant::now()) {
                on_line(&line);
            }
            handled += 1;

            if stop {
                debug!("stopping event loop");
                break;
            }
        }

        handled
    }

    fn next_event(&self) -> Option<Event> {
        let Some(deadline) = self.dispatcher.deadline() else {
            return self.events.recv().ok();
        };

        let wait = deadline.saturating_duration_since(Instant::now());
        match self.events.recv_timeout(wait) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => Some(Event::WatchdogExpired),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn limit_reached(&self) -> bool {
        self.stop_after
            .is_some_and(|limit| self.dispatcher.reports().len() >= limit)
    }

    pub fn dispatcher(&self) -> &Dispatcher<C, S> {
        &self.dispatcher
    }

    pub fn into_dispatcher(self) -> Dispatcher<C, S> {
        self.dispatcher
    }
}

/// The same loop over a tokio queue, with `sleep_until` for the watchdog.
///
/// Returns when [`Event::Shutdown`] is handled or the queue closes.
#[cfg(feature = "async")]
pub async fn run_async<C, S, F>(
    dispatcher: &mut Dispatcher<C, S>,
    events: &mut tokio::sync::mpsc::Receiver<Event>,
    mut on_line: F,
) where
    C: CommandSink,
    S: FileStore,
    F: FnMut(&str),
{
    use tokio::time::{sleep_until, Instant as TokioInstant};

    loop {
        let deadline = dispatcher.deadline().map(TokioInstant::from_std);
        let wake_at = deadline.unwrap_or_else(TokioInstant::now);

        let event = tokio::select! {
            received = events.recv() => received,
            _ = sleep_until(wake_at), if deadline.is_some() => Some(Event::WatchdogExpired),
        };

        let now = TokioInstant::now().into_std();
        let Some(event) = event else {
            debug!("event queue closed");
            for line in dispatcher.handle(Event::Disconnect, now) {
                on_line(&line);
            }
            return;
        };

        let stop = event == Event::Shutdown;
        for line in dispatcher.handle(event, now) {
            on_line(&line);
        }
        if stop {
            debug!("shutdown requested");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::config::SessionConfig;
    use crate::dispatcher::Mode;
    use crate::testing::{MemoryStore, RecordingSink};
    use crate::transfer::TransferOutcome;

    fn dispatcher(timeout: Duration) -> Dispatcher<RecordingSink, MemoryStore> {
        let config = SessionConfig {
            watchdog_timeout: timeout,
            ..SessionConfig::default()
        };
        Dispatcher::new(RecordingSink::default(), MemoryStore::default(), config)
    }

    #[test]
    fn pump_forwards_reads_then_disconnects() {
        let (tx, rx) = channel();
        let total = pump(Cursor::new(b"abcdefghij".to_vec()), &tx, 4).unwrap();
        assert_eq!(total, 10);

        drop(tx);
        let events: Vec<Event> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                Event::from(&b"abcd"[..]),
                Event::from(&b"efgh"[..]),
                Event::from(&b"ij"[..]),
                Event::Disconnect,
            ]
        );
    }

    #[test]
    fn pump_reports_closed_queue() {
        let (tx, rx) = channel();
        drop(rx);
        let err = pump(Cursor::new(b"data".to_vec()), &tx, 4).unwrap_err();
        assert!(matches!(err, SessionError::ChannelClosed));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn pump_read_error_still_disconnects() {
        let (tx, rx) = channel();
        let err = pump(FailingReader, &tx, 4).unwrap_err();
        assert!(matches!(err, SessionError::Io(_)));
        assert_eq!(rx.try_recv().unwrap(), Event::Disconnect);
    }

    #[test]
    fn loop_completes_transfer_and_sees_close() {
        let (tx, rx) = channel();
        tx.bytes(&b"hello\n"[..]).unwrap();
        tx.bytes(&b"Sending file: a.bin,4\n"[..]).unwrap();
        tx.bytes(&b"WXYZ"[..]).unwrap();
        drop(tx);

        let mut lines = Vec::new();
        let mut event_loop = EventLoop::new(dispatcher(Duration::from_secs(5)), rx);
        let handled = event_loop.run(|line| lines.push(line.to_string()));

        assert_eq!(handled, 3);
        assert_eq!(
            lines,
            vec![
                "hello\n",
                "Started receiving a.bin (4 bytes)\n",
                "File receive complete\n"
            ]
        );
        let dispatcher = event_loop.into_dispatcher();
        assert_eq!(dispatcher.store().files[0].data(), b"WXYZ");
        assert_eq!(dispatcher.commands().texts(), vec!["FIL:ACK\n"]);
    }

    #[test]
    fn loop_closing_mid_transfer_abandons() {
        let (tx, rx) = channel();
        tx.bytes(&b"Sending file: a.bin,4000\n"[..]).unwrap();
        tx.bytes(vec![0u8; 1024]).unwrap();
        drop(tx);

        let mut event_loop = EventLoop::new(dispatcher(Duration::from_secs(5)), rx);
        event_loop.run(|_| {});

        let dispatcher = event_loop.dispatcher();
        assert_eq!(dispatcher.mode(), Mode::Idle);
        assert_eq!(dispatcher.reports()[0].outcome, TransferOutcome::Disconnected);
        assert_eq!(dispatcher.store().abandoned.len(), 1);
    }

    #[test]
    fn loop_injects_expiry_when_link_is_silent() {
        let (tx, rx) = channel();
        tx.bytes(&b"Sending file: slow.bin,100\n"[..]).unwrap();

        let stopper = tx.clone();
        let mut lines = Vec::new();
        let mut event_loop = EventLoop::new(dispatcher(Duration::from_millis(20)), rx);
        event_loop.run(|line| {
            if line.starts_with("File receive timeout") {
                stopper.send(Event::Shutdown).unwrap();
            }
            lines.push(line.to_string());
        });

        assert_eq!(
            lines,
            vec![
                "Started receiving slow.bin (100 bytes)\n",
                "File receive timeout: no packet completed within 20 ms\n"
            ]
        );
        let dispatcher = event_loop.dispatcher();
        assert_eq!(dispatcher.commands().texts(), vec!["FIL:NACK\n"]);
        assert_eq!(dispatcher.reports()[0].outcome, TransferOutcome::Disconnected);
        drop(tx);
    }

    #[test]
    fn loop_can_exit_on_link_disconnect() {
        let (tx, rx) = channel();
        let keep_open = tx.clone();
        pump(Cursor::new(b"one\ntwo\n".to_vec()), &tx, 3).unwrap();

        let mut lines = Vec::new();
        let mut event_loop =
            EventLoop::new(dispatcher(Duration::from_secs(5)), rx).exit_on_disconnect();
        event_loop.run(|line| lines.push(line.to_string()));

        assert_eq!(lines, vec!["one\n", "two\n"]);
        drop(keep_open);
    }

    #[test]
    fn loop_stops_after_transfer_limit() {
        let (tx, rx) = channel();
        let producer = thread::spawn(move || {
            tx.bytes(&b"Sending file: one.bin,2\n"[..]).unwrap();
            tx.bytes(&b"ok"[..]).unwrap();
            tx.bytes(&b"after\n"[..]).unwrap();
            tx
        });

        let mut lines = Vec::new();
        let mut event_loop =
            EventLoop::new(dispatcher(Duration::from_secs(5)), rx).stop_after_transfers(1);
        event_loop.run(|line| lines.push(line.to_string()));
        let _tx = producer.join().unwrap();

        assert_eq!(lines.last().unwrap(), "File receive complete\n");
        assert!(event_loop.dispatcher().reports()[0].is_complete());
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn async_loop_nacks_on_paused_clock() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        tx.send(Event::from(&b"Sending file: slow.bin,100\n"[..]))
            .await
            .unwrap();
        tx.send(Event::from(&b"partial"[..])).await.unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            tx.send(Event::Shutdown).await.unwrap();
        });

        let mut dispatcher = dispatcher(Duration::from_millis(200));
        let mut lines = Vec::new();
        run_async(&mut dispatcher, &mut rx, |line| lines.push(line.to_string())).await;

        assert_eq!(dispatcher.commands().texts(), vec!["FIL:NACK\n"]);
        assert_eq!(dispatcher.mode(), Mode::Idle);
        assert_eq!(
            lines[1],
            "File receive timeout: no packet completed within 200 ms\n"
        );
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn async_loop_disconnects_when_senders_drop() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        tx.send(Event::from(&b"Sending file: a.bin,10\n"[..]))
            .await
            .unwrap();
        drop(tx);

        let mut dispatcher = dispatcher(Duration::from_millis(200));
        run_async(&mut dispatcher, &mut rx, |_| {}).await;

        assert!(dispatcher.commands().sent.is_empty());
        assert_eq!(dispatcher.reports()[0].outcome, TransferOutcome::Disconnected);
    }
}
