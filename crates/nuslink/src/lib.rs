//! Console and packetised file receive over a BLE UART link.
//!
//! A peripheral streams newline-terminated text over a notification
//! characteristic and, on request, a file in 1024-byte packets that the host
//! acknowledges one by one.
//!
//! # Crate Structure
//!
//! - [`transport`]: collaborator traits, the file store and the Unix socket bridge
//! - [`frame`]: line reassembly, transfer sentinel parsing and protocol commands
//! - [`session`]: dispatcher, transfer state machine, watchdog and event loops

/// Re-export transport types.
pub mod transport {
    pub use nuslink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use nuslink_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use nuslink_session::*;
}
