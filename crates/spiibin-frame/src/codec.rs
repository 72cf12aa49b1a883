use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::reply::MalformedReply;

/// Request start marker.
pub const FRAME_START: u8 = 0xD3;

/// Request end marker.
pub const FRAME_END: u8 = 0xD6;

/// Reply start marker (data and error replies).
pub const REPLY_START: u8 = 0xE3;

/// Reply end marker.
pub const REPLY_END: u8 = 0xE6;

/// Start marker (1) + opcode (1) + body length (2).
pub const HEADER_SIZE: usize = 4;

/// End marker.
pub const TRAILER_SIZE: usize = 1;

/// Header + trailer bytes wrapped around every body.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + TRAILER_SIZE;

/// Largest body a single packet may carry (controller setting GETCONF(99,8)).
pub const MAX_PACKET_DATA: usize = 1400;

/// Largest complete packet.
pub const MAX_PACKET_SIZE: usize = MAX_PACKET_DATA + FRAME_OVERHEAD;

/// Bit 7 of reply byte 3: another slice is waiting on the controller.
pub const SLICE_AVAILABLE: u8 = 0x80;

const BODY_LENGTH_MASK: u16 = 0x7FFF;

/// A binary frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub start: u8,
    pub opcode: u8,
    pub body: Bytes,
    pub end: u8,
}

impl Frame {
    /// A request frame carrying `body`.
    pub fn request(opcode: u8, body: impl Into<Bytes>) -> Self {
        Self {
            start: FRAME_START,
            opcode,
            body: body.into(),
            end: FRAME_END,
        }
    }

    /// Body length as carried in the header.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// The total wire size of this frame (header + body + trailer).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.body.len()
    }

    /// Encode this frame into freshly allocated bytes.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        put_frame(self.start, self.opcode, &self.body, self.end, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a request frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬────────┬─────────────┬──────────────┬────────┐
/// │ Start  │ Opcode │ Body length │ Body         │ End    │
/// │ 0xD3   │ (1B)   │ (2B LE)     │ (length B)   │ 0xD6   │
/// └────────┴────────┴─────────────┴──────────────┴────────┘
/// ```
pub fn encode_frame(opcode: u8, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    put_frame(FRAME_START, opcode, body, FRAME_END, dst)
}

fn put_frame(start: u8, opcode: u8, body: &[u8], end: u8, dst: &mut BytesMut) -> Result<()> {
    if body.len() > MAX_PACKET_DATA {
        return Err(FrameError::PayloadTooLarge {
            size: body.len(),
            max: MAX_PACKET_DATA,
        });
    }
    dst.reserve(FRAME_OVERHEAD + body.len());
    dst.put_u8(start);
    dst.put_u8(opcode);
    dst.put_u16_le(body.len() as u16);
    dst.put_slice(body);
    dst.put_u8(end);
    Ok(())
}

/// Decoded reply header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub start: u8,
    pub opcode: u8,
    /// Body length with the continuation bit masked off.
    pub body_len: u16,
    /// The controller holds another slice of this array.
    pub more_slices: bool,
}

impl ReplyHeader {
    /// Parse the 4-byte header at the front of `buf`.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let raw_len = u16::from_le_bytes([buf[2], buf[3]]);
        Some(Self {
            start: buf[0],
            opcode: buf[1],
            body_len: raw_len & BODY_LENGTH_MASK,
            more_slices: buf[3] & SLICE_AVAILABLE != 0,
        })
    }
}

/// Strip the header and trailer from a data reply.
///
/// The data is little-endian and returned as received.
pub fn reply_data(buf: &[u8]) -> std::result::Result<&[u8], MalformedReply> {
    if buf.len() < FRAME_OVERHEAD {
        return Err(MalformedReply::TooShort { len: buf.len() });
    }
    if buf[0] != REPLY_START {
        return Err(MalformedReply::BadStart(buf[0]));
    }
    let last = buf[buf.len() - 1];
    if last != REPLY_END {
        return Err(MalformedReply::BadEnd(last));
    }
    Ok(&buf[HEADER_SIZE..buf.len() - TRAILER_SIZE])
}
