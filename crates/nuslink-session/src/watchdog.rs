use std::time::{Duration, Instant};

/// A restartable one-shot countdown.
///
/// The watchdog holds a deadline rather than a thread. The event loop asks
/// for the [`deadline`](Self::deadline), and once it passes it feeds an
/// expiry event back through the same queue as the byte chunks; the
/// dispatcher then confirms it with [`poll`](Self::poll).
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    /// A disarmed watchdog that will use `timeout` on [`reset`](Self::reset).
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Arm with a new duration starting at `now`.
    pub fn arm(&mut self, timeout: Duration, now: Instant) {
        self.timeout = timeout;
        self.deadline = Some(now + timeout);
    }

    /// Re-arm with the current duration starting at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    /// Disarm. A pending expiry becomes a no-op.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Fire if armed and `now` has reached the deadline.
    ///
    /// Returns `true` at most once per arm/reset cycle.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
