//! Stream demultiplexing and packetised file receive.
//!
//! One ordered queue of [`Event`]s drives a [`Dispatcher`]: byte chunks from
//! the link, watchdog expiries, user commands and disconnects. While idle the
//! dispatcher reassembles text lines into the [`ConsoleLog`]; a transfer
//! sentinel switches it into the [`TransferMachine`], which frames payload
//! into packets, stores them and answers `FIL:ACK` / `FIL:NACK`.

pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod runtime;
pub mod transfer;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    OverrunPolicy, SessionConfig, DEFAULT_CONSOLE_CAPACITY, DEFAULT_WATCHDOG_TIMEOUT,
};
pub use console::ConsoleLog;
pub use dispatcher::{Dispatcher, Mode};
pub use error::{Result, SessionError};
pub use event::Event;
pub use runtime::{channel, pump, EventLoop, EventSender};
pub use transfer::{TransferMachine, TransferOutcome, TransferReport, TransferSession};
pub use watchdog::Watchdog;

#[cfg(feature = "async")]
pub use runtime::run_async;
