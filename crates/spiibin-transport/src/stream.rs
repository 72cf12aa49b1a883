use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{ByteChannel, Eos};

/// Smallest timeout handed to the OS; a zero socket timeout means "block forever".
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

const FLUSH_CHUNK_SIZE: usize = 256;

/// A blocking stream whose deadlines can be adjusted per call.
pub trait TimeoutStream: Read + Write {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()>;
}

impl TimeoutStream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }
}

#[cfg(unix)]
impl TimeoutStream for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_nonblocking(self, nonblocking)
    }
}

/// [`ByteChannel`] over a blocking stream.
///
/// Reads honour the input delimiter byte by byte so nothing past the
/// delimiter is consumed; with no delimiter configured, reads go straight
/// into the caller's buffer.
pub struct StreamChannel<S> {
    inner: S,
    eos: Eos,
}

impl StreamChannel<TcpStream> {
    /// Connect to a controller's TCP command port.
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;
        debug!(addr, "connected to controller");
        Ok(Self::new(stream))
    }
}

impl<S: TimeoutStream> StreamChannel<S> {
    /// Wrap a stream using the controller's ASCII delimiters.
    pub fn new(inner: S) -> Self {
        Self::with_eos(inner, Eos::carriage_return())
    }

    /// Wrap a stream with explicit delimiters.
    pub fn with_eos(inner: S, eos: Eos) -> Self {
        Self { inner, eos }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the channel and return the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn write_all(&mut self, bytes: &[u8], timeout: Duration) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(TransportError::WriteTimeout(timeout))
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }
}

impl<S: TimeoutStream> ByteChannel for StreamChannel<S> {
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        self.inner
            .set_write_timeout(Some(timeout.max(MIN_TIMEOUT)))?;
        self.write_all(bytes, timeout)?;
        if !self.eos.output.is_empty() {
            let eos = self.eos.output.clone();
            self.write_all(&eos, timeout)?;
        }
        loop {
            match self.inner.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        trace!(bytes = bytes.len(), "channel write");
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0usize;

        while filled < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.inner
                .set_read_timeout(Some((deadline - now).max(MIN_TIMEOUT)))?;

            let end = if self.eos.input.is_empty() {
                buf.len()
            } else {
                filled + 1
            };

            match self.inner.read(&mut buf[filled..end]) {
                Ok(0) => {
                    if filled == 0 {
                        return Err(TransportError::Closed);
                    }
                    break;
                }
                Ok(n) => {
                    filled += n;
                    if !self.eos.input.is_empty() && buf[..filled].ends_with(&self.eos.input) {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        trace!(filled, requested = buf.len(), "channel read");
        Ok(filled)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.set_nonblocking(true)?;

        let mut scratch = [0u8; FLUSH_CHUNK_SIZE];
        let mut discarded = 0usize;
        let drained = loop {
            match self.inner.read(&mut scratch) {
                Ok(0) => break Ok(()),
                Ok(n) => discarded += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        self.inner.set_nonblocking(false)?;
        if discarded > 0 {
            debug!(discarded, "flushed stale input");
        }
        drained.map_err(TransportError::Io)
    }

    fn eos(&self) -> Eos {
        self.eos.clone()
    }

    fn set_eos(&mut self, eos: Eos) -> Result<()> {
        self.eos = eos;
        Ok(())
    }
}

impl<S> std::fmt::Debug for StreamChannel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamChannel")
            .field("eos", &self.eos)
            .finish_non_exhaustive()
    }
}
