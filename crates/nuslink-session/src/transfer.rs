//! Packetised file receive.
//!
//! The machine has two main states. `Idle` holds no session. `Receiving` holds a
//! [`TransferSession`] and an armed [`Watchdog`]. Payload bytes accumulate
//! into a packet buffer that is flushed when it reaches `packet_size` or when
//! it would complete the declared size, whichever comes first. Every flushed
//! packet is stored and then acknowledged with `FIL:ACK`. A watchdog expiry
//! drops the partial packet and answers `FIL:NACK` so the peripheral resends.
//!
//! A transfer the store refuses still has its payload on the way. The machine
//! swallows up to the declared size, without acknowledging, until the link
//! goes quiet for one watchdog period.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use nuslink_frame::{Command, ControlDirective};
use nuslink_transport::{CommandSink, FileStore, StoreError};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{OverrunPolicy, SessionConfig};
use crate::watchdog::Watchdog;

/// Collaborators used by one state-machine step, plus where to put notices.
pub struct Step<'a, C, S> {
    pub commands: &'a mut C,
    pub store: &'a mut S,
    /// Console lines produced by the step, each ending in `\n`.
    pub notices: &'a mut Vec<String>,
}

impl<'a, C, S> Step<'a, C, S> {
    pub fn new(commands: &'a mut C, store: &'a mut S, notices: &'a mut Vec<String>) -> Self {
        Self {
            commands,
            store,
            notices,
        }
    }
}

/// Live state of one in-progress file reception.
#[derive(Debug)]
pub struct TransferSession {
    filename: String,
    declared_size: u64,
    bytes_received: u64,
    packet: BytesMut,
    packets: u64,
    timeouts: u64,
    overruns: u64,
}

impl TransferSession {
    fn new(directive: ControlDirective, packet_size: usize) -> Self {
        Self {
            filename: directive.filename,
            declared_size: directive.declared_size,
            bytes_received: 0,
            packet: BytesMut::with_capacity(packet_size),
            packets: 0,
            timeouts: 0,
            overruns: 0,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    /// Bytes stored so far. Counted per flushed packet, not per chunk.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Bytes in the packet currently being assembled.
    pub fn packet_len(&self) -> usize {
        self.packet.len()
    }

    /// Packets stored and acknowledged.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    fn remaining(&self) -> u64 {
        self.declared_size.saturating_sub(self.bytes_received)
    }

    fn report(&self, outcome: TransferOutcome) -> TransferReport {
        TransferReport {
            filename: self.filename.clone(),
            declared_size: self.declared_size,
            bytes_received: self.bytes_received,
            packets: self.packets,
            timeouts: self.timeouts,
            overruns: self.overruns,
            outcome,
        }
    }
}

/// How a transfer session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Every declared byte was stored and the file was published.
    Completed { path: PathBuf },
    /// Persistence failed; the partial file was dropped.
    Aborted { reason: String },
    /// The link went away mid-transfer.
    Disconnected,
}

/// Summary of a terminated transfer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub filename: String,
    pub declared_size: u64,
    pub bytes_received: u64,
    pub packets: u64,
    pub timeouts: u64,
    pub overruns: u64,
    pub outcome: TransferOutcome,
}

impl TransferReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, TransferOutcome::Completed { .. })
    }
}

/// The file-receive protocol state machine.
#[derive(Debug)]
pub struct TransferMachine {
    session: Option<TransferSession>,
    /// Payload bytes still expected for a refused transfer.
    drain: Option<u64>,
    watchdog: Watchdog,
    timeout: Duration,
    packet_size: usize,
    overrun_policy: OverrunPolicy,
}

impl TransferMachine {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            session: None,
            drain: None,
            watchdog: Watchdog::new(config.watchdog_timeout),
            timeout: config.watchdog_timeout,
            packet_size: config.packet_size.max(1),
            overrun_policy: config.overrun_policy,
        }
    }

    /// Whether inbound bytes belong to a transfer, accepted or refused.
    pub fn is_receiving(&self) -> bool {
        self.session.is_some() || self.drain.is_some()
    }

    /// Whether a refused transfer's payload is being discarded.
    pub fn is_draining(&self) -> bool {
        self.drain.is_some()
    }

    pub fn session(&self) -> Option<&TransferSession> {
        self.session.as_ref()
    }

    /// When the watchdog will expire, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// `Idle -> Receiving`. Opens the destination file and arms the watchdog.
    ///
    /// Returns a report only when the transfer ends immediately (a declared
    /// size of zero).
    pub fn open<C: CommandSink, S: FileStore>(
        &mut self,
        directive: ControlDirective,
        now: Instant,
        step: &mut Step<'_, C, S>,
    ) -> Option<TransferReport> {
        if let Some(session) = &self.session {
            warn!(
                open = %session.filename,
                requested = %directive.filename,
                "transfer already open, ignoring directive"
            );
            return None;
        }
        if let Some(remaining) = self.drain {
            warn!(remaining, requested = %directive.filename, "still draining, ignoring directive");
            return None;
        }

        if let Err(err) = step.store.begin(&directive.filename, directive.declared_size) {
            error!(filename = %directive.filename, error = %err, "cannot open destination file");
            step.notices.push(format!("File receive error: {err}\n"));
            if directive.declared_size > 0 {
                self.drain = Some(directive.declared_size);
                self.watchdog.arm(self.timeout, now);
            }
            return None;
        }

        info!(
            filename = %directive.filename,
            declared_size = directive.declared_size,
            "transfer started"
        );
        step.notices.push(format!(
            "Started receiving {} ({} bytes)\n",
            directive.filename, directive.declared_size
        ));

        let empty = directive.declared_size == 0;
        self.session = Some(TransferSession::new(directive, self.packet_size));
        self.watchdog.arm(self.timeout, now);

        if empty {
            return self.complete(step);
        }
        None
    }

    /// Feed payload bytes. Returns a report when the session terminates.
    pub fn on_bytes<C: CommandSink, S: FileStore>(
        &mut self,
        chunk: &[u8],
        now: Instant,
        step: &mut Step<'_, C, S>,
    ) -> Option<TransferReport> {
        if let Some(remaining) = self.drain.as_mut() {
            *remaining = remaining.saturating_sub(chunk.len() as u64);
            if *remaining == 0 {
                debug!("refused transfer drained");
                self.drain = None;
                self.watchdog.cancel();
            } else {
                self.watchdog.reset(now);
            }
            return None;
        }

        let Some(session) = self.session.as_mut() else {
            warn!(len = chunk.len(), "payload bytes with no open transfer");
            return None;
        };

        session.packet.extend_from_slice(chunk);
        let pending = session.packet.len();

        if pending as u64 >= session.remaining() {
            return self.flush_final(now, step);
        }

        if pending == self.packet_size {
            let packet = session.packet.split();
            if let Err(err) = self.accept(packet, now, step) {
                return self.abort(err, step);
            }
        } else if pending > self.packet_size {
            session.overruns += 1;
            warn!(
                filename = %session.filename,
                pending,
                packet_size = self.packet_size,
                policy = ?self.overrun_policy,
                "packet overrun"
            );
            step.notices.push(format!(
                "Error: received more than {} bytes without ACK\n",
                self.packet_size
            ));
            if self.overrun_policy == OverrunPolicy::Discard {
                session.packet.clear();
            }
        }

        None
    }

    /// Handle a watchdog expiry event.
    ///
    /// Stale expiries (the deadline moved since the event was queued) and
    /// expiries while idle are ignored. Returns whether a NACK was issued.
    pub fn on_timeout<C: CommandSink, S>(
        &mut self,
        now: Instant,
        step: &mut Step<'_, C, S>,
    ) -> bool {
        if !self.watchdog.poll(now) {
            return false;
        }
        if let Some(remaining) = self.drain.take() {
            debug!(remaining, "link quiet, ending drain of refused transfer");
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let dropped = session.packet.len();
        session.packet.clear();
        session.timeouts += 1;
        warn!(
            filename = %session.filename,
            dropped,
            bytes_received = session.bytes_received,
            declared_size = session.declared_size,
            "packet timed out"
        );

        send_protocol(step.commands, Command::Nack);
        step.notices.push(format!(
            "File receive timeout: no packet completed within {} ms\n",
            self.timeout.as_millis()
        ));
        self.watchdog.reset(now);
        true
    }

    /// `Receiving -> Idle` unconditionally. Idempotent.
    pub fn disconnect<S: FileStore>(&mut self, store: &mut S) -> Option<TransferReport> {
        self.watchdog.cancel();
        self.drain = None;
        let session = self.session.take()?;
        store.abandon();
        info!(
            filename = %session.filename,
            bytes_received = session.bytes_received,
            declared_size = session.declared_size,
            "transfer abandoned on disconnect"
        );
        Some(session.report(TransferOutcome::Disconnected))
    }

    fn flush_final<C: CommandSink, S: FileStore>(
        &mut self,
        now: Instant,
        step: &mut Step<'_, C, S>,
    ) -> Option<TransferReport> {
        let mut payload = {
            let session = self.session.as_mut()?;
            let remaining = usize::try_from(session.remaining()).unwrap_or(usize::MAX);
            let excess = session.packet.len().saturating_sub(remaining);
            if excess > 0 {
                warn!(
                    filename = %session.filename,
                    excess,
                    "discarding bytes past declared size"
                );
                session.packet.truncate(remaining);
            }
            session.packet.split()
        };

        while !payload.is_empty() {
            let take = payload.len().min(self.packet_size);
            let packet = payload.split_to(take);
            if let Err(err) = self.accept(packet, now, step) {
                return self.abort(err, step);
            }
        }

        self.complete(step)
    }

    fn accept<C: CommandSink, S: FileStore>(
        &mut self,
        packet: BytesMut,
        now: Instant,
        step: &mut Step<'_, C, S>,
    ) -> Result<(), StoreError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        step.store.store(&packet)?;
        session.bytes_received += packet.len() as u64;
        session.packets += 1;
        debug!(
            filename = %session.filename,
            bytes_received = session.bytes_received,
            declared_size = session.declared_size,
            "received {}/{} bytes",
            session.bytes_received,
            session.declared_size
        );

        send_protocol(step.commands, Command::Ack);
        self.watchdog.reset(now);
        Ok(())
    }

    fn complete<C, S: FileStore>(&mut self, step: &mut Step<'_, C, S>) -> Option<TransferReport> {
        let session = self.session.take()?;
        self.watchdog.cancel();

        match step.store.finish() {
            Ok(path) => {
                info!(
                    filename = %session.filename,
                    bytes = session.bytes_received,
                    packets = session.packets,
                    path = %path.display(),
                    "file receive complete"
                );
                step.notices.push("File receive complete\n".to_string());
                Some(session.report(TransferOutcome::Completed { path }))
            }
            Err(err) => {
                error!(filename = %session.filename, error = %err, "failed to finish file");
                step.store.abandon();
                step.notices.push(format!("File receive error: {err}\n"));
                Some(session.report(TransferOutcome::Aborted {
                    reason: err.to_string(),
                }))
            }
        }
    }

    fn abort<C, S: FileStore>(
        &mut self,
        err: StoreError,
        step: &mut Step<'_, C, S>,
    ) -> Option<TransferReport> {
        self.watchdog.cancel();
        let session = self.session.take()?;
        error!(
            filename = %session.filename,
            bytes_received = session.bytes_received,
            error = %err,
            "store failed, aborting transfer"
        );
        step.store.abandon();
        step.notices.push(format!("File receive error: {err}\n"));
        Some(session.report(TransferOutcome::Aborted {
            reason: err.to_string(),
        }))
    }
}

fn send_protocol<C: CommandSink>(commands: &mut C, command: Command) {
    if let Err(err) = commands.send(&command.encode()) {
        warn!(command = %command, error = %err, "protocol command dropped");
    }
}
