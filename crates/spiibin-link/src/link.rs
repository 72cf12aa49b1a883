use std::time::Duration;

use spiibin_transport::ByteChannel;
use tracing::trace;

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};

/// Binary array link to one controller.
///
/// `read_array`/`write_array` and their typed variants live in
/// [`read`](crate::read) and [`write`](crate::write).
#[derive(Debug)]
pub struct Link<C> {
    pub(crate) channel: C,
    pub(crate) config: LinkConfig,
}

impl<C: ByteChannel> Link<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            config: LinkConfig::default(),
        }
    }

    /// Fails with [`LinkError::Config`] when `config` does not validate.
    pub fn with_config(channel: C, config: LinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { channel, config })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: LinkConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_inner(self) -> C {
        self.channel
    }
}

/// Write one request packet in full.
pub(crate) fn send_packet<C: ByteChannel + ?Sized>(
    channel: &mut C,
    frame: &[u8],
    timeout: Duration,
) -> Result<()> {
    let written = channel.write(frame, timeout)?;
    if written != frame.len() {
        return Err(LinkError::ShortWrite {
            expected: frame.len(),
            actual: written,
        });
    }
    trace!(len = frame.len(), opcode = frame.get(1).copied(), "sent packet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiibin_transport::MemoryChannel;

    #[test]
    fn with_config_validates() {
        let config = LinkConfig {
            ack_byte: 0xE3,
            ..LinkConfig::default()
        };
        let err = Link::with_config(MemoryChannel::new(), config.clone()).unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));

        let mut link = Link::new(MemoryChannel::new());
        assert!(link.set_config(config).is_err());
        assert_eq!(link.config(), &LinkConfig::default());
    }

    #[test]
    fn short_write_is_reported() {
        struct HalfWriter(MemoryChannel);

        impl ByteChannel for HalfWriter {
            fn write(&mut self, bytes: &[u8], timeout: Duration) -> spiibin_transport::Result<usize> {
                self.0.write(&bytes[..bytes.len() / 2], timeout)
            }
            fn read(&mut self, buf: &mut [u8], timeout: Duration) -> spiibin_transport::Result<usize> {
                self.0.read(buf, timeout)
            }
            fn flush(&mut self) -> spiibin_transport::Result<()> {
                self.0.flush()
            }
            fn eos(&self) -> spiibin_transport::Eos {
                self.0.eos()
            }
            fn set_eos(&mut self, eos: spiibin_transport::Eos) -> spiibin_transport::Result<()> {
                self.0.set_eos(eos)
            }
        }

        let mut channel = HalfWriter(MemoryChannel::new());
        let err = send_packet(&mut channel, &[0xD3, 0xF0, 0, 0], Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, LinkError::ShortWrite { expected: 4, actual: 2 }));
    }
}
