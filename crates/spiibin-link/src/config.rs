use std::time::Duration;

use spiibin_frame::REPLY_START;

use crate::error::{LinkError, Result};

/// Default acknowledgement byte sent by the controller after a write packet.
pub const DEFAULT_ACK_BYTE: u8 = 0x06;

/// Timeouts and protocol constants for a [`Link`](crate::Link).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Write timeout for read requests.
    pub command_timeout: Duration,
    /// Write timeout for array write packets and read timeout for array
    /// data replies.
    pub array_timeout: Duration,
    /// Read timeout for write acknowledgements.
    pub ack_timeout: Duration,
    /// First byte of a successful write reply.
    pub ack_byte: u8,
    /// Upper bound on an unacknowledged write reply (error frame).
    pub max_message_len: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(1),
            array_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(2),
            ack_byte: DEFAULT_ACK_BYTE,
            max_message_len: 256,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ack_byte == REPLY_START {
            return Err(LinkError::Config(format!(
                "ack byte {:#04x} collides with the reply start marker",
                self.ack_byte
            )));
        }
        if self.max_message_len < 2 {
            return Err(LinkError::Config(format!(
                "max message length {} cannot hold an acknowledgement",
                self.max_message_len
            )));
        }
        for (name, timeout) in [
            ("command", self.command_timeout),
            ("array", self.array_timeout),
            ("ack", self.ack_timeout),
        ] {
            if timeout.is_zero() {
                return Err(LinkError::Config(format!("{name} timeout must be non-zero")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LinkConfig::default();
        assert_eq!(config.ack_byte, 0x06);
        assert_eq!(config.array_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_ack_byte_equal_to_reply_start() {
        let config = LinkConfig {
            ack_byte: 0xE3,
            ..LinkConfig::default()
        };
        assert!(matches!(config.validate(), Err(LinkError::Config(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = LinkConfig {
            ack_timeout: Duration::ZERO,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
