use std::time::Duration;

use crate::error::Result;

/// End-of-string delimiters a channel applies in ASCII mode.
///
/// The controller's ASCII command channel terminates every message with a
/// carriage return. Binary exchanges must run with both delimiters cleared,
/// otherwise a `0x0D` inside array data would end a read early.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eos {
    /// Delimiter that ends a read when it is received.
    pub input: Vec<u8>,
    /// Delimiter appended to every write.
    pub output: Vec<u8>,
}

impl Eos {
    /// No delimiters (raw binary mode).
    pub fn none() -> Self {
        Self::default()
    }

    /// Carriage return on both directions (ASCII command mode).
    pub fn carriage_return() -> Self {
        Self {
            input: b"\r".to_vec(),
            output: b"\r".to_vec(),
        }
    }

    /// True when neither direction has a delimiter.
    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }
}

/// A blocking duplex byte channel to the controller.
///
/// Every call carries its own timeout because the protocol uses different
/// deadlines for commands, bulk array data, and write acknowledgements.
pub trait ByteChannel {
    /// Write all of `bytes`, followed by the output delimiter if one is set.
    ///
    /// Returns the number of bytes of `bytes` written.
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize>;

    /// Read into `buf` until it is full, the input delimiter is received, or
    /// `timeout` elapses.
    ///
    /// A timeout is not an error: the number of bytes received so far is
    /// returned and the caller decides whether a short read is fatal.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any input that has already arrived.
    fn flush(&mut self) -> Result<()>;

    /// Currently configured delimiters.
    fn eos(&self) -> Eos;

    /// Replace the configured delimiters.
    fn set_eos(&mut self, eos: Eos) -> Result<()>;
}

impl<C: ByteChannel + ?Sized> ByteChannel for &mut C {
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(bytes, timeout)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn eos(&self) -> Eos {
        (**self).eos()
    }

    fn set_eos(&mut self, eos: Eos) -> Result<()> {
        (**self).set_eos(eos)
    }
}

impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(bytes, timeout)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn eos(&self) -> Eos {
        (**self).eos()
    }

    fn set_eos(&mut self, eos: Eos) -> Result<()> {
        (**self).set_eos(eos)
    }
}
