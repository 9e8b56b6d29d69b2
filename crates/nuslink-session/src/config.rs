use std::time::Duration;

use nuslink_frame::{DEFAULT_MAX_LINE_LEN, PACKET_SIZE};

/// Default console capacity in lines.
pub const DEFAULT_CONSOLE_CAPACITY: usize = 50;

/// Default watchdog interval.
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(200);

/// What to do when a packet grows past `packet_size` without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrunPolicy {
    /// Keep accumulating; the next watchdog expiry clears the buffer and NACKs.
    #[default]
    AwaitTimeout,
    /// Drop the buffered packet immediately; the session stays open.
    Discard,
}

/// Configuration for one receive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Payload bytes per acknowledged packet. Default: 1024.
    pub packet_size: usize,
    /// Time allowed for a packet to complete before NACK. Default: 200 ms.
    pub watchdog_timeout: Duration,
    /// Console lines kept for display. Default: 50.
    pub console_capacity: usize,
    /// Bound on unterminated text. Default: 4 KiB.
    pub max_line_len: usize,
    /// Overrun handling. Default: [`OverrunPolicy::AwaitTimeout`].
    pub overrun_policy: OverrunPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            packet_size: PACKET_SIZE,
            watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT,
            console_capacity: DEFAULT_CONSOLE_CAPACITY,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            overrun_policy: OverrunPolicy::default(),
        }
    }
}
