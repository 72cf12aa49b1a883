//! SPiiPlus binary array protocol codec.
//!
//! Every binary request is framed as:
//! - a start marker (`0xD3`) and an opcode byte
//! - a 2-byte little-endian body length
//! - the body and an end marker (`0xD6`)
//!
//! Replies use `0xE3`/`0xE6` and carry a continuation flag in the top bit of
//! the length field. This crate builds read/write commands for float64 and
//! int32 arrays, plans how large writes are split across packets, and
//! classifies controller error frames. It performs no I/O.

pub mod codec;
pub mod command;
pub mod descriptor;
pub mod error;
pub mod opcode;
pub mod reply;
pub mod slice;

pub use codec::{
    encode_frame, reply_data, Frame, ReplyHeader, FRAME_END, FRAME_OVERHEAD, FRAME_START,
    HEADER_SIZE, MAX_PACKET_DATA, MAX_PACKET_SIZE, REPLY_END, REPLY_START, SLICE_AVAILABLE,
};
pub use command::{
    chunk_layout, elements_in_write_frame, encode_array_read_command,
    encode_array_slice_read_command, encode_array_write_command, ChunkLayout, ReadCommand,
    WriteCommand,
};
pub use descriptor::{ArrayDescriptor, ArrayShape, ElementKind, IndexRange};
pub use error::{FrameError, Result};
pub use opcode::opcode_name;
pub use reply::{
    decode_error, decode_inline_error, ControllerFault, MalformedReply, ReplyStatus,
    ERROR_INDEX_OUT_OF_RANGE, ERROR_UNDEFINED_VARIABLE,
};
pub use slice::{next_slice, rebase_descriptor, SliceStep, WriteChunk, WritePlan, MAX_WRITE_SLICES};
