use bytes::{BufMut, Bytes, BytesMut};

/// Maximum payload accumulated before an acknowledgement is due.
pub const PACKET_SIZE: usize = 1024;

/// Acknowledges one completed packet.
pub const ACK: &str = "FIL:ACK";

/// Rejects the packet in flight; the peripheral should retransmit it.
pub const NACK: &str = "FIL:NACK";

/// An outbound command written to the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `FIL:ACK`
    Ack,
    /// `FIL:NACK`
    Nack,
    /// Free-form text typed by a user (e.g. `*IDN?`).
    Text(String),
}

impl Command {
    /// The command text without its line terminator.
    pub fn as_str(&self) -> &str {
        match self {
            Command::Ack => ACK,
            Command::Nack => NACK,
            Command::Text(text) => text,
        }
    }

    /// Wire form: the text terminated by exactly one `\n` if not already.
    pub fn encode(&self) -> Bytes {
        let text = self.as_str().as_bytes();
        let mut buf = BytesMut::with_capacity(text.len() + 1);
        buf.put_slice(text);
        if !text.ends_with(b"\n") {
            buf.put_u8(b'\n');
        }
        buf.freeze()
    }

    /// Whether this is part of the file-transfer handshake.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Command::Ack | Command::Nack)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str().trim_end_matches(['\r', '\n']))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_commands_are_newline_terminated() {
        assert_eq!(Command::Ack.encode().as_ref(), b"FIL:ACK\n");
        assert_eq!(Command::Nack.encode().as_ref(), b"FIL:NACK\n");
    }

    #[test]
    fn text_gets_single_terminator() {
        assert_eq!(
            Command::Text("*IDN?".to_string()).encode().as_ref(),
            b"*IDN?\n"
        );
        assert_eq!(
            Command::Text("*RST\n".to_string()).encode().as_ref(),
            b"*RST\n"
        );
    }

    #[test]
    fn display_omits_terminator() {
        assert_eq!(Command::Text("MEAS?\n".to_string()).to_string(), "MEAS?");
        assert_eq!(Command::Ack.to_string(), "FIL:ACK");
        assert!(Command::Nack.is_protocol());
        assert!(!Command::Text("x".to_string()).is_protocol());
    }
}
