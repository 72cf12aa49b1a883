use std::collections::VecDeque;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Result, TransportError};
use crate::traits::{ByteChannel, Eos};

/// Scripted in-memory [`ByteChannel`].
///
/// Each queued reply is released into the receive buffer when the next
/// write arrives, which mirrors the controller's strict request/response
/// behaviour. Reads never block: whatever is buffered is returned, so an
/// empty buffer behaves like an immediate timeout.
#[derive(Debug)]
pub struct MemoryChannel {
    replies: VecDeque<Bytes>,
    rx: BytesMut,
    writes: Vec<Bytes>,
    write_timeouts: Vec<Duration>,
    eos: Eos,
    eos_history: Vec<Eos>,
    flushes: usize,
    closed: bool,
}

impl MemoryChannel {
    /// Create a channel in ASCII mode with no scripted replies.
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            rx: BytesMut::new(),
            writes: Vec::new(),
            write_timeouts: Vec::new(),
            eos: Eos::carriage_return(),
            eos_history: Vec::new(),
            flushes: 0,
            closed: false,
        }
    }

    /// Queue a reply to be released by the next write.
    pub fn push_reply(&mut self, reply: impl Into<Bytes>) -> &mut Self {
        self.replies.push_back(reply.into());
        self
    }

    /// Place bytes in the receive buffer immediately (stale input).
    pub fn preload(&mut self, bytes: &[u8]) {
        self.rx.extend_from_slice(bytes);
    }

    /// Make reads fail once the receive buffer is exhausted.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Every write issued so far, in order.
    pub fn writes(&self) -> &[Bytes] {
        &self.writes
    }

    /// Timeout passed with each write, in order.
    pub fn write_timeouts(&self) -> &[Duration] {
        &self.write_timeouts
    }

    /// Every delimiter configuration applied through [`ByteChannel::set_eos`].
    pub fn eos_history(&self) -> &[Eos] {
        &self.eos_history
    }

    /// Number of input flushes.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Replies still waiting for a write.
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteChannel for MemoryChannel {
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        let mut record = BytesMut::from(bytes);
        record.extend_from_slice(&self.eos.output);
        self.writes.push(record.freeze());
        self.write_timeouts.push(timeout);

        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend_from_slice(&reply);
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if self.rx.is_empty() && self.closed {
            return Err(TransportError::Closed);
        }

        let mut n = buf.len().min(self.rx.len());
        if !self.eos.input.is_empty() {
            if let Some(pos) = self.rx[..n]
                .windows(self.eos.input.len())
                .position(|w| w == self.eos.input.as_slice())
            {
                n = pos + self.eos.input.len();
            }
        }

        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx.advance(n);
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.rx.clear();
        self.flushes += 1;
        Ok(())
    }

    fn eos(&self) -> Eos {
        self.eos.clone()
    }

    fn set_eos(&mut self, eos: Eos) -> Result<()> {
        self.eos_history.push(eos.clone());
        self.eos = eos;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(10);

    #[test]
    fn reply_released_by_write() {
        let mut channel = MemoryChannel::new();
        channel.set_eos(Eos::none()).unwrap();
        channel.push_reply(vec![1u8, 2, 3]);

        let mut buf = [0u8; 3];
        assert_eq!(channel.read(&mut buf, T).unwrap(), 0);

        channel.write(b"cmd", T).unwrap();
        assert_eq!(channel.read(&mut buf, T).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(channel.writes()[0].as_ref(), b"cmd");
        assert_eq!(channel.write_timeouts(), &[T]);
    }

    #[test]
    fn partial_reads_leave_remainder() {
        let mut channel = MemoryChannel::new();
        channel.set_eos(Eos::none()).unwrap();
        channel.push_reply(vec![9u8; 10]);
        channel.write(b"x", T).unwrap();

        let mut two = [0u8; 2];
        assert_eq!(channel.read(&mut two, T).unwrap(), 2);
        let mut rest = [0u8; 64];
        assert_eq!(channel.read(&mut rest, T).unwrap(), 8);
    }

    #[test]
    fn ascii_mode_applies_delimiters() {
        let mut channel = MemoryChannel::new();
        channel.push_reply(&b"42\r:"[..]);
        channel.write(b"?X", T).unwrap();

        assert_eq!(channel.writes()[0].as_ref(), b"?X\r");
        let mut buf = [0u8; 8];
        let n = channel.read(&mut buf, T).unwrap();
        assert_eq!(&buf[..n], b"42\r");
    }

    #[test]
    fn flush_clears_stale_input() {
        let mut channel = MemoryChannel::new();
        channel.preload(b"junk");
        channel.flush().unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(channel.read(&mut buf, T).unwrap(), 0);
        assert_eq!(channel.flushes(), 1);
    }

    #[test]
    fn closed_channel_errors_when_drained() {
        let mut channel = MemoryChannel::new();
        channel.close();

        let mut buf = [0u8; 1];
        assert!(matches!(
            channel.read(&mut buf, T),
            Err(TransportError::Closed)
        ));
    }
}
