use std::time::Duration;

use bytes::{Bytes, BytesMut};
use spiibin_frame::{
    decode_error, decode_inline_error, encode_array_read_command,
    encode_array_slice_read_command, reply_data, ArrayDescriptor, ElementKind, ReplyHeader,
    ReplyStatus, MAX_PACKET_DATA, MAX_PACKET_SIZE,
};
use spiibin_transport::ByteChannel;
use tracing::{debug, warn};

use crate::error::{LinkError, Result};
use crate::link::{send_packet, Link};
use crate::raw::RawModeGuard;

/// Progress of a multi-packet read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceState {
    /// Index of the last slice requested (the initial read is slice 0).
    pub slice_index: u32,
    pub bytes_remaining: usize,
    pub bytes_read: usize,
}

impl SliceState {
    pub fn new(data_bytes: usize) -> Self {
        Self {
            slice_index: 0,
            bytes_remaining: data_bytes,
            bytes_read: 0,
        }
    }

    /// Account for one reply's data; returns the bytes actually used.
    pub fn record(&mut self, received: usize) -> usize {
        let used = received.min(self.bytes_remaining);
        self.bytes_remaining -= used;
        self.bytes_read += used;
        used
    }

    /// Move on to the next continuation slice.
    pub fn advance(&mut self) -> u32 {
        self.slice_index += 1;
        self.slice_index
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_remaining == 0
    }
}

impl<C: ByteChannel> Link<C> {
    /// Read an array in wire (little-endian) byte order.
    ///
    /// Issues the initial read and then one slice read per continuation
    /// flag until every data byte of `descriptor` has arrived.
    pub fn read_array(&mut self, descriptor: &ArrayDescriptor, kind: ElementKind) -> Result<Bytes> {
        let Link { channel, config } = self;
        let mut request = encode_array_read_command(descriptor, kind)?;
        let data_bytes = request.data_bytes;
        debug!(
            %descriptor,
            %kind,
            data_bytes,
            opcode = request.opcode,
            "array read"
        );

        let mut raw = RawModeGuard::enter(channel)?;
        let mut out = BytesMut::with_capacity(data_bytes.min(MAX_PACKET_DATA));
        let mut state = SliceState::new(data_bytes);

        loop {
            send_packet(&mut *raw, &request.frame, config.command_timeout)?;
            let reply = read_reply(
                &mut *raw,
                request.expected_reply_bytes,
                config.array_timeout,
            )?;
            check_read_reply(&reply, request.expected_reply_bytes)?;

            let data = reply_data(&reply)?;
            let more_slices = ReplyHeader::parse(&reply).is_some_and(|header| header.more_slices);
            let used = state.record(data.len());
            out.extend_from_slice(&data[..used]);

            if state.is_complete() {
                if more_slices {
                    debug!(%descriptor, "continuation flag set after final slice");
                }
                break;
            }
            if !more_slices {
                return Err(LinkError::Incomplete {
                    expected: data_bytes,
                    received: state.bytes_read,
                });
            }

            let slice = state.advance();
            debug!(%descriptor, slice, bytes_remaining = state.bytes_remaining, "array read slice");
            request = encode_array_slice_read_command(descriptor, kind, slice)?;
        }

        debug!(%descriptor, bytes = out.len(), slices = state.slice_index + 1, "array read complete");
        Ok(out.freeze())
    }

    pub fn read_f64_array(&mut self, descriptor: &ArrayDescriptor) -> Result<Vec<f64>> {
        let bytes = self.read_array(descriptor, ElementKind::Float64)?;
        Ok(bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect())
    }

    pub fn read_i32_array(&mut self, descriptor: &ArrayDescriptor) -> Result<Vec<i32>> {
        let bytes = self.read_array(descriptor, ElementKind::Int32)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(chunk);
                i32::from_le_bytes(raw)
            })
            .collect())
    }
}

pub(crate) fn read_reply<C: ByteChannel + ?Sized>(
    channel: &mut C,
    len: usize,
    timeout: Duration,
) -> Result<Bytes> {
    let mut buf = BytesMut::zeroed(len.min(MAX_PACKET_SIZE));
    let n = channel.read(&mut buf, timeout)?;
    buf.truncate(n);
    Ok(buf.freeze())
}

/// Classify an array-read reply before its data is used.
fn check_read_reply(reply: &[u8], expected: usize) -> Result<()> {
    match decode_error(reply) {
        ReplyStatus::Fault(fault) => return Err(fault.into()),
        ReplyStatus::Malformed(malformed) => return Err(malformed.into()),
        ReplyStatus::Data => {}
    }

    if reply.len() < expected {
        if let Some(status) = decode_inline_error(reply, false) {
            match status {
                ReplyStatus::Fault(fault) => return Err(fault.into()),
                ReplyStatus::Malformed(malformed) => return Err(malformed.into()),
                ReplyStatus::Data => {}
            }
        }
        warn!(expected, actual = reply.len(), "short array reply");
        return Err(LinkError::ShortRead {
            expected,
            actual: reply.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiibin_frame::{MalformedReply, REPLY_END, REPLY_START, SLICE_AVAILABLE};
    use spiibin_transport::{Eos, MemoryChannel, TransportError};

    fn line(name: &str, end: u32) -> ArrayDescriptor {
        ArrayDescriptor::new(name)
            .expect("valid name")
            .dim1(0, end)
            .expect("valid range")
    }

    fn data_reply(opcode: u8, data: &[u8], more: bool) -> Vec<u8> {
        let mut len = (data.len() as u16).to_le_bytes();
        if more {
            len[1] |= SLICE_AVAILABLE;
        }
        let mut reply = vec![REPLY_START, opcode, len[0], len[1]];
        reply.extend_from_slice(data);
        reply.push(REPLY_END);
        reply
    }

    fn f64_data(values: impl IntoIterator<Item = f64>) -> Vec<u8> {
        values.into_iter().flat_map(f64::to_le_bytes).collect()
    }

    #[test]
    fn single_packet_read() {
        let values: Vec<f64> = (0..8).map(|i| i as f64 * 0.5).collect();
        let mut channel = MemoryChannel::new();
        channel.push_reply(data_reply(0xF0, &f64_data(values.clone()), false));

        let mut link = Link::new(&mut channel);
        let read = link.read_f64_array(&line("APOS", 7)).expect("read should succeed");
        assert_eq!(read, values);

        assert_eq!(channel.writes().len(), 1);
        assert_eq!(channel.writes()[0][1], 0xF0);
        assert_eq!(channel.eos(), Eos::carriage_return());
    }

    #[test]
    fn continuation_issues_one_slice_read() {
        // 250 doubles = 2000 bytes: 1400 in the first reply, 600 in slice 1.
        let values: Vec<f64> = (0..250).map(f64::from).collect();
        let bytes = f64_data(values.clone());

        let mut channel = MemoryChannel::new();
        let first = data_reply(0x41, &bytes[..1400], true);
        assert_eq!(first.len(), MAX_PACKET_SIZE);
        channel.push_reply(first);
        channel.push_reply(data_reply(0x42, &bytes[1400..], false));

        let mut link = Link::new(&mut channel);
        let read = link.read_f64_array(&line("DATA", 249)).expect("read should succeed");
        assert_eq!(read, values);

        let writes = channel.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0][1], 0x41);
        assert_eq!(writes[1][1], 0x42);
        assert_eq!(&writes[1][4..9], b"%1%??");
    }

    #[test]
    fn two_digit_slice_indices() {
        // 1800 doubles = 14400 bytes: the initial reply plus slices 1..=10.
        let values: Vec<f64> = (0..1800).map(f64::from).collect();
        let bytes = f64_data(values.clone());
        let mut channel = MemoryChannel::new();
        let packets: Vec<&[u8]> = bytes.chunks(MAX_PACKET_DATA).collect();
        assert_eq!(packets.len(), 11);
        for (i, packet) in packets.iter().enumerate() {
            let opcode = if i == 0 { 0x41 } else { 0x42 };
            channel.push_reply(data_reply(opcode, packet, i + 1 < packets.len()));
        }

        let mut link = Link::new(&mut channel);
        let read = link.read_f64_array(&line("BIG", 1799)).expect("read should succeed");
        assert_eq!(read, values);

        let writes = channel.writes();
        assert_eq!(writes.len(), 11);
        assert_eq!(&writes[9][4..9], b"%9%??");
        assert_eq!(&writes[10][4..10], b"%10%??");
    }

    #[test]
    fn stale_continuation_flag_after_last_byte_is_ignored() {
        let bytes = f64_data((0..4).map(f64::from));
        let mut channel = MemoryChannel::new();
        channel.push_reply(data_reply(0xF0, &bytes, true));

        let mut link = Link::new(&mut channel);
        let read = link.read_array(&line("V", 3), ElementKind::Float64).expect("read");
        assert_eq!(read.as_ref(), bytes.as_slice());
        assert_eq!(channel.writes().len(), 1);
    }

    #[test]
    fn missing_continuation_is_incomplete() {
        let bytes = vec![0u8; 1400];
        let mut channel = MemoryChannel::new();
        channel.push_reply(data_reply(0x41, &bytes, false));

        let mut link = Link::new(&mut channel);
        let err = link
            .read_array(&line("DATA", 249), ElementKind::Float64)
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::Incomplete {
                expected: 2000,
                received: 1400
            }
        ));
    }

    #[test]
    fn int32_read() {
        let values = [-1i32, 0, 7, i32::MAX];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut channel = MemoryChannel::new();
        channel.push_reply(data_reply(0xF1, &bytes, false));

        let mut link = Link::new(&mut channel);
        let read = link.read_i32_array(&line("IV", 3)).expect("read");
        assert_eq!(read, values);
        assert_eq!(channel.writes()[0][7], 0x04);
    }

    #[test]
    fn documented_error_frame() {
        let mut channel = MemoryChannel::new();
        channel.push_reply(vec![0xE3, 0xF0, b'6', b'?', b'1', b'0', b'6', b'4', 0x0D, 0xE6]);

        let mut link = Link::new(&mut channel);
        let err = link.read_f64_array(&line("NOPE", 7)).unwrap_err();
        assert_eq!(err.controller_code(), Some(1064));
        assert_eq!(channel.eos(), Eos::carriage_return());
    }

    #[test]
    fn legacy_error_frame() {
        let mut channel = MemoryChannel::new();
        channel.push_reply(vec![
            0xE3, 0xF0, 0x06, 0x00, b'?', b'1', b'0', b'3', b'5', 0x0D, 0xE6,
        ]);

        let mut link = Link::new(&mut channel);
        match link.read_f64_array(&line("V", 7)).unwrap_err() {
            LinkError::Controller(fault) => {
                assert_eq!(fault.code, 1035);
                assert!(fault.legacy);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn inline_error_in_short_reply() {
        // Error body followed by trailing bytes the controller appends.
        let mut reply = vec![0xE3, 0xF0, 0x07, 0x00, b'?', b'2', b'0', b'1', b'2', 0x0D];
        reply.extend_from_slice(&[0x0A, 0xE6]);
        let mut channel = MemoryChannel::new();
        channel.push_reply(reply);

        let mut link = Link::new(&mut channel);
        match link.read_f64_array(&line("V", 7)).unwrap_err() {
            LinkError::Controller(fault) => {
                assert_eq!(fault.code, 2012);
                assert!(!fault.legacy);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn float_data_resembling_error_is_data() {
        // Data with '?' at body offset 0 and CR four bytes later.
        let mut bytes = vec![0u8; 16];
        bytes[0] = b'?';
        bytes[5] = 0x0D;
        let mut channel = MemoryChannel::new();
        channel.push_reply(data_reply(0xF0, &bytes, false));

        let mut link = Link::new(&mut channel);
        let read = link.read_array(&line("V", 1), ElementKind::Float64).expect("read");
        assert_eq!(read.as_ref(), bytes.as_slice());
    }

    #[test]
    fn short_reply_is_transport_error() {
        let mut channel = MemoryChannel::new();
        channel.push_reply(data_reply(0xF0, &[0u8; 8], false));

        let mut link = Link::new(&mut channel);
        let err = link
            .read_array(&line("V", 7), ElementKind::Float64)
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::ShortRead {
                expected: 69,
                actual: 13
            }
        ));
        assert_eq!(err.category(), crate::ErrorCategory::Transport);
    }

    #[test]
    fn bad_end_marker_is_malformed() {
        let mut reply = data_reply(0xF0, &[0u8; 8], false);
        let last = reply.len() - 1;
        reply[last] = 0x00;
        let mut channel = MemoryChannel::new();
        channel.push_reply(reply);

        let mut link = Link::new(&mut channel);
        let err = link
            .read_array(&line("V", 0), ElementKind::Float64)
            .unwrap_err();
        assert!(matches!(err, LinkError::Malformed(MalformedReply::BadEnd(0x00))));
    }

    #[test]
    fn stale_input_is_flushed() {
        let mut channel = MemoryChannel::new();
        channel.preload(b"garbage");
        channel.push_reply(data_reply(0xF0, &[1u8; 8], false));

        let mut link = Link::new(&mut channel);
        let read = link.read_array(&line("V", 0), ElementKind::Float64).expect("read");
        assert_eq!(read.as_ref(), &[1u8; 8]);
    }

    #[test]
    fn closed_channel() {
        let mut channel = MemoryChannel::new();
        channel.close();

        let mut link = Link::new(&mut channel);
        let err = link
            .read_array(&line("V", 0), ElementKind::Float64)
            .unwrap_err();
        assert!(matches!(err, LinkError::Transport(TransportError::Closed)));
    }

    #[test]
    fn slice_state_accounting() {
        let mut state = SliceState::new(2000);
        assert_eq!(state.record(1400), 1400);
        assert!(!state.is_complete());
        assert_eq!(state.advance(), 1);
        assert_eq!(state.record(1400), 600);
        assert!(state.is_complete());
        assert_eq!(state.bytes_read, 2000);
    }
}
