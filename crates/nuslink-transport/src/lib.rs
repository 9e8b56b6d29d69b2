//! Collaborator seams for the nuslink receive core.
//!
//! The core never touches a radio or a filesystem directly. It talks to:
//! - a [`CommandSink`] that carries outbound command bytes to the peripheral
//! - a [`FileStore`] that durably persists received packets
//!
//! This crate defines those traits and ships the concrete implementations
//! the CLI uses: a Unix socket [`BridgeStream`] to a process that owns the
//! BLE link, a [`StreamSink`] over any writer, and a [`DirectoryStore`].

pub mod error;
pub mod store;
pub mod traits;

#[cfg(unix)]
pub mod bridge;

pub use error::{Result, StoreError, TransportError};
pub use store::DirectoryStore;
pub use traits::{CommandSink, DiscardSink, FileStore, StreamSink};

#[cfg(unix)]
pub use bridge::BridgeStream;
