//! Byte-level codecs for the nuslink notification stream.
//!
//! The peripheral multiplexes two things onto one unreliable byte stream:
//! - newline-terminated diagnostic text, reassembled by [`LineReassembler`]
//! - binary file payload, announced in-band by a sentinel line
//!   (`Sending file: <name>,<size>`) that [`detect`] recognises
//!
//! Everything here is pure: no I/O, no clocks.

pub mod directive;
pub mod error;
pub mod line;
pub mod protocol;

pub use directive::{detect, sanitize_filename, ControlDirective, SENTINEL};
pub use error::{FrameError, Result};
pub use line::{LineReassembler, Reassembled, ReassemblerConfig, DEFAULT_MAX_LINE_LEN};
pub use protocol::{Command, ACK, NACK, PACKET_SIZE};
