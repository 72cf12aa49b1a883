//! Binary read/write command construction.
//!
//! Read body:        `%??` + size byte + `VAR(a,b)(c,d)`
//! Slice read body:  `%<n>%??` + size byte + `VAR(a,b)(c,d)`
//! Write body:       `%>>` + size byte + `VAR(a,b)(c,d)` + `/%` + data
//! Sliced write:     `%<digit>%>>` + size byte + `VAR(a,b)(c,d)` + `/%` + data

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::codec::{Frame, FRAME_OVERHEAD, MAX_PACKET_DATA, MAX_PACKET_SIZE};
use crate::descriptor::{ArrayDescriptor, ElementKind};
use crate::error::{FrameError, Result};
use crate::slice::MAX_WRITE_SLICES;

const READ_PREFIX: &[u8] = b"%??";
const WRITE_PREFIX: &[u8] = b"%>>";
const DATA_SEPARATOR: &[u8] = b"/%";
const SLICE_MARKER: u8 = b'%';

/// `%??` + size byte.
const READ_OVERHEAD: usize = READ_PREFIX.len() + 1;

/// `%>>` + size byte + `/%`.
const WRITE_OVERHEAD: usize = WRITE_PREFIX.len() + 1 + DATA_SEPARATOR.len();

/// `%<digit>` in front of a write body.
const SLICED_WRITE_OVERHEAD: usize = WRITE_OVERHEAD + 2;

/// A successful write reply: acknowledgement byte + echoed opcode.
pub const WRITE_ACK_LEN: usize = 2;

/// Highest read slice index the protocol documents (single digit).
const MAX_DOCUMENTED_READ_SLICE: u32 = 9;

/// An encoded read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCommand {
    pub frame: Bytes,
    pub opcode: u8,
    /// Reply size including header and trailer.
    pub expected_reply_bytes: usize,
    /// Data bytes covered by the whole descriptor.
    pub data_bytes: usize,
}

impl ReadCommand {
    pub fn out_bytes(&self) -> usize {
        self.frame.len()
    }
}

/// An encoded write request for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    pub frame: Bytes,
    pub opcode: u8,
    pub out_bytes: usize,
    /// Size of a successful acknowledgement.
    pub in_bytes: usize,
    pub elements_in_chunk: usize,
    /// Chunks of this descriptor still to send after this one.
    pub remaining_slices: usize,
}

/// How a descriptor's data is split into write packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub ascii_len: usize,
    pub total_elements: usize,
    /// Elements carried by every packet except possibly the last.
    pub max_elements_per_packet: usize,
    pub num_packets: usize,
    /// False when everything fits in one unsliced packet.
    pub sliced: bool,
}

impl ChunkLayout {
    /// Elements carried by packet `slice`, or `None` past the last packet.
    pub fn elements_in_slice(&self, slice: usize) -> Option<usize> {
        if slice >= self.num_packets {
            return None;
        }
        if slice + 1 == self.num_packets {
            Some(self.total_elements - self.max_elements_per_packet * slice)
        } else {
            Some(self.max_elements_per_packet)
        }
    }

    /// Packets left to send after packet `slice`.
    pub fn remaining_after(&self, slice: usize) -> usize {
        self.num_packets.saturating_sub(slice + 1)
    }
}

/// Build the command that starts an array read.
pub fn encode_array_read_command(
    descriptor: &ArrayDescriptor,
    kind: ElementKind,
) -> Result<ReadCommand> {
    let data_bytes = descriptor.data_bytes(kind)?;
    let (opcode, expected_reply_bytes) = if data_bytes > MAX_PACKET_DATA {
        (kind.long_read_opcode(), MAX_PACKET_SIZE)
    } else {
        (kind.short_read_opcode(), data_bytes + FRAME_OVERHEAD)
    };

    let ascii = descriptor.ascii();
    let mut body = BytesMut::with_capacity(READ_OVERHEAD + ascii.len());
    body.put_slice(READ_PREFIX);
    body.put_u8(kind.data_size_byte());
    body.put_slice(ascii.as_bytes());

    let frame = frame_bytes(opcode, body)?;
    trace!(%descriptor, opcode, expected_reply_bytes, data_bytes, "encoded array read");
    Ok(ReadCommand {
        frame,
        opcode,
        expected_reply_bytes,
        data_bytes,
    })
}

/// Build the command that fetches continuation slice `slice` of an array read.
///
/// Slices are numbered from 1; slice `n` starts `n * MAX_PACKET_DATA` bytes
/// into the array.
pub fn encode_array_slice_read_command(
    descriptor: &ArrayDescriptor,
    kind: ElementKind,
    slice: u32,
) -> Result<ReadCommand> {
    let data_bytes = descriptor.data_bytes(kind)?;
    let offset = (slice as usize).saturating_mul(MAX_PACKET_DATA);
    if slice == 0 || offset >= data_bytes {
        return Err(FrameError::SliceOutOfRange { slice, data_bytes });
    }
    if slice > MAX_DOCUMENTED_READ_SLICE {
        warn!(%descriptor, slice, "read slice index exceeds one digit");
    }

    let bytes_remaining = data_bytes - offset;
    let expected_reply_bytes = if bytes_remaining > MAX_PACKET_DATA {
        MAX_PACKET_SIZE
    } else {
        bytes_remaining + FRAME_OVERHEAD
    };

    let ascii = descriptor.ascii();
    let index = slice.to_string();
    let mut body = BytesMut::with_capacity(2 + index.len() + READ_OVERHEAD + ascii.len());
    body.put_u8(SLICE_MARKER);
    body.put_slice(index.as_bytes());
    body.put_slice(READ_PREFIX);
    body.put_u8(kind.data_size_byte());
    body.put_slice(ascii.as_bytes());

    let opcode = kind.slice_read_opcode();
    let frame = frame_bytes(opcode, body)?;
    trace!(%descriptor, slice, expected_reply_bytes, "encoded array slice read");
    Ok(ReadCommand {
        frame,
        opcode,
        expected_reply_bytes,
        data_bytes,
    })
}

/// Work out how a descriptor's data is packed into write packets.
///
/// Elements never straddle a packet boundary.
pub fn chunk_layout(descriptor: &ArrayDescriptor, kind: ElementKind) -> Result<ChunkLayout> {
    let ascii_len = descriptor.ascii_len();
    let total_elements = descriptor.num_elements()?;
    let total_bytes = descriptor.data_bytes(kind)?;

    if ascii_len + WRITE_OVERHEAD + total_bytes <= MAX_PACKET_DATA {
        return Ok(ChunkLayout {
            ascii_len,
            total_elements,
            max_elements_per_packet: total_elements,
            num_packets: 1,
            sliced: false,
        });
    }

    let room = MAX_PACKET_DATA.saturating_sub(ascii_len + SLICED_WRITE_OVERHEAD);
    let max_elements_per_packet = room / kind.size();
    if max_elements_per_packet == 0 {
        return Err(FrameError::ProtocolLimit(format!(
            "descriptor {descriptor} leaves no room for {kind} data in a packet"
        )));
    }

    Ok(ChunkLayout {
        ascii_len,
        total_elements,
        max_elements_per_packet,
        num_packets: total_elements.div_ceil(max_elements_per_packet),
        sliced: true,
    })
}

/// Build the write command for chunk `slice` of `descriptor`.
///
/// `data` holds the little-endian element bytes for the whole descriptor;
/// the chunk is cut from it. `slice` must be a single digit: after ten
/// chunks the caller restarts at 0 with a rebased descriptor (see
/// [`rebase_descriptor`](crate::slice::rebase_descriptor)).
pub fn encode_array_write_command(
    descriptor: &ArrayDescriptor,
    kind: ElementKind,
    data: &[u8],
    slice: u8,
) -> Result<WriteCommand> {
    let (single_opcode, sliced_opcode) = kind
        .write_opcodes()
        .ok_or(FrameError::UnsupportedWrite(kind))?;

    let expected = descriptor.data_bytes(kind)?;
    if data.len() != expected {
        return Err(FrameError::DataLength {
            expected,
            actual: data.len(),
        });
    }
    if slice >= MAX_WRITE_SLICES {
        return Err(FrameError::ProtocolLimit(format!(
            "write slice index {slice} cannot be sent as one digit"
        )));
    }

    let layout = chunk_layout(descriptor, kind)?;
    let index = usize::from(slice);
    let elements_in_chunk = layout
        .elements_in_slice(index)
        .ok_or(FrameError::SliceOutOfRange {
            slice: u32::from(slice),
            data_bytes: expected,
        })?;
    let first = index * layout.max_elements_per_packet * kind.size();
    let chunk = &data[first..first + elements_in_chunk * kind.size()];

    let ascii = descriptor.ascii();
    let mut body = BytesMut::with_capacity(SLICED_WRITE_OVERHEAD + ascii.len() + chunk.len());
    if layout.sliced {
        body.put_u8(SLICE_MARKER);
        body.put_u8(b'0' + slice);
    }
    body.put_slice(WRITE_PREFIX);
    body.put_u8(kind.data_size_byte());
    body.put_slice(ascii.as_bytes());
    body.put_slice(DATA_SEPARATOR);
    body.put_slice(chunk);

    let opcode = if layout.sliced {
        sliced_opcode
    } else {
        single_opcode
    };
    let frame = frame_bytes(opcode, body)?;
    let remaining_slices = layout.remaining_after(index);
    trace!(
        %descriptor,
        slice,
        elements_in_chunk,
        remaining_slices,
        out_bytes = frame.len(),
        "encoded array write"
    );

    Ok(WriteCommand {
        out_bytes: frame.len(),
        frame,
        opcode,
        in_bytes: WRITE_ACK_LEN,
        elements_in_chunk,
        remaining_slices,
    })
}

/// Recover the element count carried by an encoded write frame.
pub fn elements_in_write_frame(
    out_bytes: usize,
    ascii_len: usize,
    kind: ElementKind,
    sliced: bool,
) -> usize {
    let overhead = if sliced {
        SLICED_WRITE_OVERHEAD
    } else {
        WRITE_OVERHEAD
    };
    out_bytes.saturating_sub(FRAME_OVERHEAD + overhead + ascii_len) / kind.size()
}

fn frame_bytes(opcode: u8, body: BytesMut) -> Result<Bytes> {
    Frame::request(opcode, body.freeze()).to_bytes()
}
