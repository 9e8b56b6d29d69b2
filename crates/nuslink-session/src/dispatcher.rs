use std::time::Instant;

use nuslink_frame::{detect, Command, FrameError, LineReassembler, ReassemblerConfig};
use nuslink_transport::{CommandSink, FileStore, TransportError};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::console::ConsoleLog;
use crate::event::Event;
use crate::transfer::{Step, TransferMachine, TransferReport};

/// Which handler inbound bytes are routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Bytes are text lines for the console.
    Idle,
    /// Bytes are transfer payload.
    Receiving,
}

/// Routes every event to the line path or the transfer path.
///
/// The dispatcher owns the whole receive-side state: the line reassembler,
/// the transfer machine and the console log. Events are handled strictly one
/// at a time, and a mode switch only takes effect for the next chunk.
#[derive(Debug)]
pub struct Dispatcher<C, S> {
    reassembler: LineReassembler,
    transfer: TransferMachine,
    console: ConsoleLog,
    commands: C,
    store: S,
    reports: Vec<TransferReport>,
}

impl<C: CommandSink, S: FileStore> Dispatcher<C, S> {
    pub fn new(commands: C, store: S, config: SessionConfig) -> Self {
        Self {
            reassembler: LineReassembler::with_config(ReassemblerConfig {
                max_line_len: config.max_line_len,
            }),
            transfer: TransferMachine::new(&config),
            console: ConsoleLog::new(config.console_capacity),
            commands,
            store,
            reports: Vec::new(),
        }
    }

    /// Process one event. Returns the console lines it appended, in order.
    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<String> {
        let mut appended = Vec::new();
        match event {
            Event::Bytes(chunk) => {
                if self.transfer.is_receiving() {
                    self.on_payload(&chunk, now, &mut appended);
                } else {
                    self.on_text(&chunk, now, &mut appended);
                }
            }
            Event::WatchdogExpired => {
                let mut step = Step::new(&mut self.commands, &mut self.store, &mut appended);
                self.transfer.on_timeout(now, &mut step);
            }
            Event::Command(text) => self.send_command(&text, &mut appended),
            Event::Disconnect | Event::Shutdown => self.disconnect(),
        }

        for line in &appended {
            self.console.append(line.clone());
        }
        appended
    }

    // Outcome echoes are transport chatter and stay off the console while a
    // transfer is running.
    fn send_command(&mut self, text: &str, appended: &mut Vec<String>) {
        let command = Command::Text(text.to_string());
        let echo = match self.commands.send(&command.encode()) {
            Ok(()) => {
                debug!(command = %command, "command sent");
                format!("> {command}\n")
            }
            Err(TransportError::NotConnected) => {
                warn!(command = %command, "not connected, command dropped");
                "Not connected: cannot send\n".to_string()
            }
            Err(err) => {
                warn!(command = %command, error = %err, "command send failed");
                format!("Send failed: {err}\n")
            }
        };

        if self.transfer.is_receiving() {
            debug!(line = %echo.trim_end(), "console suppressed during transfer");
        } else {
            appended.push(echo);
        }
    }

    fn on_payload(&mut self, chunk: &[u8], now: Instant, appended: &mut Vec<String>) {
        let mut step = Step::new(&mut self.commands, &mut self.store, appended);
        if let Some(report) = self.transfer.on_bytes(chunk, now, &mut step) {
            self.reports.push(report);
        }
    }

    fn on_text(&mut self, chunk: &[u8], now: Instant, appended: &mut Vec<String>) {
        let mut lines = self.reassembler.feed(chunk).lines.into_iter();

        while let Some(line) = lines.next() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    appended.push(overflow_notice(&err));
                    continue;
                }
            };
            let directive = match detect(&line) {
                Ok(Some(directive)) => directive,
                Ok(None) => {
                    appended.push(line);
                    continue;
                }
                Err(err) => {
                    debug!(error = %err, "directive rejected, treating as text");
                    appended.push(line);
                    continue;
                }
            };

            let mut step = Step::new(&mut self.commands, &mut self.store, appended);
            if let Some(report) = self.transfer.open(directive, now, &mut step) {
                self.reports.push(report);
            }

            if self.transfer.is_receiving() {
                let mut discarded: usize = lines.by_ref().map(|line| line_len(&line)).sum();
                discarded += self.reassembler.clear();
                if discarded > 0 {
                    warn!(discarded, "dropping bytes that shared a chunk with the directive");
                }
                return;
            }
        }
    }

    fn disconnect(&mut self) {
        let dropped = self.reassembler.clear();
        if dropped > 0 {
            debug!(dropped, "dropping unterminated text on disconnect");
        }
        if let Some(report) = self.transfer.disconnect(&mut self.store) {
            self.reports.push(report);
        } else {
            info!("disconnected");
        }
    }

    pub fn mode(&self) -> Mode {
        if self.transfer.is_receiving() {
            Mode::Receiving
        } else {
            Mode::Idle
        }
    }

    /// Pending watchdog deadline, for the event loop's wait.
    pub fn deadline(&self) -> Option<Instant> {
        self.transfer.deadline()
    }

    pub fn transfer(&self) -> &TransferMachine {
        &self.transfer
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    /// Every transfer that has terminated, oldest first.
    pub fn reports(&self) -> &[TransferReport] {
        &self.reports
    }

    pub fn commands(&self) -> &C {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut C {
        &mut self.commands
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (C, S, ConsoleLog, Vec<TransferReport>) {
        (self.commands, self.store, self.console, self.reports)
    }
}

fn overflow_notice(err: &FrameError) -> String {
    match err {
        FrameError::LineTooLong { len, max } => {
            format!("Error: discarded {len} bytes of a line longer than {max}\n")
        }
        other => format!("Error: {other}\n"),
    }
}

fn line_len(line: &Result<String, FrameError>) -> usize {
    match line {
        Ok(text) => text.len(),
        Err(FrameError::LineTooLong { len, .. }) => *len,
        Err(_) => 0,
    }
}
