use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use spiibin_frame::{ArrayDescriptor, ElementKind};
use spiibin_transport::ByteChannel;

use crate::error::{LinkError, Result};
use crate::link::Link;
use crate::write::WriteReport;

/// Cloneable handle to a [`Link`] used from several threads.
///
/// The lock is held for a whole logical transfer, so the packets of two
/// transfers never interleave on the channel.
pub struct SharedLink<C> {
    inner: Arc<Mutex<Link<C>>>,
}

impl<C> Clone for SharedLink<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ByteChannel> SharedLink<C> {
    pub fn new(link: Link<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(link)),
        }
    }

    /// Exclusive access for a sequence of transfers.
    pub fn lock(&self) -> Result<MutexGuard<'_, Link<C>>> {
        self.inner.lock().map_err(|_| LinkError::LockPoisoned)
    }

    /// Run `f` with the link locked.
    pub fn with<T>(&self, f: impl FnOnce(&mut Link<C>) -> Result<T>) -> Result<T> {
        let mut link = self.lock()?;
        f(&mut link)
    }

    pub fn read_array(&self, descriptor: &ArrayDescriptor, kind: ElementKind) -> Result<Bytes> {
        self.with(|link| link.read_array(descriptor, kind))
    }

    pub fn read_f64_array(&self, descriptor: &ArrayDescriptor) -> Result<Vec<f64>> {
        self.with(|link| link.read_f64_array(descriptor))
    }

    pub fn read_i32_array(&self, descriptor: &ArrayDescriptor) -> Result<Vec<i32>> {
        self.with(|link| link.read_i32_array(descriptor))
    }

    pub fn write_array(
        &self,
        descriptor: &ArrayDescriptor,
        kind: ElementKind,
        data: &[u8],
    ) -> Result<WriteReport> {
        self.with(|link| link.write_array(descriptor, kind, data))
    }

    pub fn write_f64_array(
        &self,
        descriptor: &ArrayDescriptor,
        values: &[f64],
    ) -> Result<WriteReport> {
        self.with(|link| link.write_f64_array(descriptor, values))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::config::LinkConfig;
    use spiibin_frame::{MAX_PACKET_DATA, REPLY_END, REPLY_START, SLICE_AVAILABLE};
    use spiibin_transport::{MemoryChannel, StreamChannel};

    /// Minimal controller: answers every read request for `V` with
    /// `elements` doubles valued by index, in as many slices as needed.
    fn serve_reads(mut stream: UnixStream, elements: usize, requests: usize) {
        let data: Vec<u8> = (0..elements)
            .flat_map(|i| (i as f64).to_le_bytes())
            .collect();
        let mut served = 0;
        while served < requests {
            let mut header = [0u8; 4];
            if stream.read_exact(&mut header).is_err() {
                return;
            }
            let body_len = u16::from_le_bytes([header[2], header[3]]) as usize;
            let mut rest = vec![0u8; body_len + 1];
            stream.read_exact(&mut rest).expect("request body");

            let slice = if rest[0] == b'%' && rest[1] != b'?' {
                let end = rest[1..]
                    .iter()
                    .position(|b| *b == b'%')
                    .expect("slice terminator");
                std::str::from_utf8(&rest[1..1 + end])
                    .expect("ascii slice")
                    .parse::<usize>()
                    .expect("numeric slice")
            } else {
                0
            };

            let start = slice * MAX_PACKET_DATA;
            let end = (start + MAX_PACKET_DATA).min(data.len());
            let chunk = &data[start..end];
            let mut len = (chunk.len() as u16).to_le_bytes();
            if end < data.len() {
                len[1] |= SLICE_AVAILABLE;
            }
            let mut reply = vec![REPLY_START, header[1], len[0], len[1]];
            reply.extend_from_slice(chunk);
            reply.push(REPLY_END);
            stream.write_all(&reply).expect("reply");

            if end == data.len() {
                served += 1;
            }
        }
    }

    #[test]
    fn concurrent_transfers_do_not_interleave() {
        let (client, server) = UnixStream::pair().expect("socket pair");
        let controller = thread::spawn(move || serve_reads(server, 400, 4));

        let config = LinkConfig {
            array_timeout: Duration::from_secs(2),
            ..LinkConfig::default()
        };
        let link = SharedLink::new(
            Link::with_config(StreamChannel::new(client), config).expect("valid config"),
        );
        let descriptor = ArrayDescriptor::new("V")
            .expect("valid name")
            .dim1(0, 399)
            .expect("valid range");

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let link = link.clone();
                let descriptor = descriptor.clone();
                thread::spawn(move || link.read_f64_array(&descriptor))
            })
            .collect();

        for worker in workers {
            let values = worker
                .join()
                .expect("worker thread")
                .expect("read should succeed");
            assert_eq!(values.len(), 400);
            assert_eq!(values[399], 399.0);
        }
        controller.join().expect("controller thread");
    }

    #[test]
    fn typed_int32_read() {
        let values = [3i32, -4, 5];
        let mut reply = vec![REPLY_START, 0xF1, 12, 0];
        reply.extend(values.iter().flat_map(|v| v.to_le_bytes()));
        reply.push(REPLY_END);
        let mut channel = MemoryChannel::new();
        channel.push_reply(reply);

        let link = SharedLink::new(Link::new(channel));
        let descriptor = ArrayDescriptor::new("IV")
            .expect("valid name")
            .dim1(0, 2)
            .expect("valid range");
        assert_eq!(link.read_i32_array(&descriptor).expect("read"), values);
        let writes = link
            .with(|link| Ok(link.channel().writes().len()))
            .expect("lock");
        assert_eq!(writes, 1);
    }
}
