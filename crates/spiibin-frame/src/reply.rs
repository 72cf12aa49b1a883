//! Controller error-frame recognition.
//!
//! Two error layouts exist in the field:
//!
//! ```text
//! documented (10 bytes): [E3][op]['6']['?'][d][d][d][d][CR][E6]
//! legacy     (11 bytes): [E3][op][06][00]['?'][d][d][d][d][CR][E6]
//! ```
//!
//! A reply cannot be classified by its start marker alone because data
//! replies start with `0xE3` too, so recognition goes by exact length and
//! the `'?' ... CR` body markers.

use tracing::warn;

use crate::codec::{HEADER_SIZE, REPLY_END, REPLY_START};

/// Error number for "variable is not defined".
pub const ERROR_UNDEFINED_VARIABLE: u16 = 1064;

/// Error number for "index is out of range".
pub const ERROR_INDEX_OUT_OF_RANGE: u16 = 1035;

const ERROR_FRAME_LEN: usize = 10;
const LEGACY_ERROR_FRAME_LEN: usize = 11;
const ERROR_BODY_LEN: u8 = b'6';
const ERROR_MARKER: u8 = b'?';
const CR: u8 = 0x0D;
const CODE_DIGITS: usize = 4;

/// A numeric fault reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("controller error #{code} for command {opcode:#04x}")]
pub struct ControllerFault {
    pub code: u16,
    /// Opcode echoed in the error frame.
    pub opcode: u8,
    /// Decoded from the 11-byte layout used by older firmware.
    pub legacy: bool,
}

/// Structural reasons a reply could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedReply {
    #[error("reply too short ({len} bytes)")]
    TooShort { len: usize },

    #[error("unexpected reply start marker {0:#04x}")]
    BadStart(u8),

    #[error("unexpected reply end marker {0:#04x}")]
    BadEnd(u8),

    #[error("error frame prefix/suffix invalid (start {start:#04x}, length {length:#04x}, end {end:#04x})")]
    BadErrorFrame { start: u8, length: u8, end: u8 },

    #[error("error frame body invalid (start {start:#04x}, end {end:#04x})")]
    BadErrorBody { start: u8, end: u8 },

    #[error("error code is not four decimal digits: {0:02x?}")]
    InvalidCode([u8; CODE_DIGITS]),

    #[error("unrecognised {len}-byte reply in legacy error format")]
    LegacyFrame { len: usize },

    #[error("write not acknowledged (first reply byte {0:#04x})")]
    NotAcknowledged(u8),
}

/// Classification of a raw reply buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Not an error frame.
    Data,
    Fault(ControllerFault),
    Malformed(MalformedReply),
}

impl ReplyStatus {
    pub fn is_data(&self) -> bool {
        matches!(self, ReplyStatus::Data)
    }
}

/// Classify a complete reply by its error-frame shape.
pub fn decode_error(buf: &[u8]) -> ReplyStatus {
    match buf.len() {
        ERROR_FRAME_LEN => decode_documented(buf),
        LEGACY_ERROR_FRAME_LEN => decode_legacy(buf),
        _ => ReplyStatus::Data,
    }
}

/// Look for an error code right after the 4-byte header: `'?'` at body
/// offset 0 and a carriage return four digits later.
///
/// Returns `None` when the buffer does not carry that marker pair. Only use
/// this on replies already known to be short; full-length float data can
/// contain the same byte values. `legacy` is copied into the reported fault.
pub fn decode_inline_error(buf: &[u8], legacy: bool) -> Option<ReplyStatus> {
    let cr_at = HEADER_SIZE + 1 + CODE_DIGITS;
    if buf.len() <= cr_at || buf[HEADER_SIZE] != ERROR_MARKER || buf[cr_at] != CR {
        return None;
    }
    let status = match parse_code(&buf[HEADER_SIZE + 1..cr_at]) {
        Ok(code) => ReplyStatus::Fault(ControllerFault {
            code,
            opcode: buf[1],
            legacy,
        }),
        Err(malformed) => ReplyStatus::Malformed(malformed),
    };
    Some(status)
}

fn decode_documented(buf: &[u8]) -> ReplyStatus {
    let (start, opcode, length, end) = (buf[0], buf[1], buf[2], buf[9]);
    if start != REPLY_START || length != ERROR_BODY_LEN || end != REPLY_END {
        warn!(start, length, end, "incorrect error reply prefix/suffix");
        return ReplyStatus::Malformed(MalformedReply::BadErrorFrame { start, length, end });
    }

    let (body_start, body_end) = (buf[3], buf[8]);
    if body_start != ERROR_MARKER || body_end != CR {
        warn!(body_start, body_end, "incorrect error body start/end");
        return ReplyStatus::Malformed(MalformedReply::BadErrorBody {
            start: body_start,
            end: body_end,
        });
    }

    match parse_code(&buf[4..8]) {
        Ok(code) => ReplyStatus::Fault(ControllerFault {
            code,
            opcode,
            legacy: false,
        }),
        Err(malformed) => ReplyStatus::Malformed(malformed),
    }
}

fn decode_legacy(buf: &[u8]) -> ReplyStatus {
    warn!(len = buf.len(), "possible legacy binary error reply");
    match decode_inline_error(buf, true) {
        Some(status @ ReplyStatus::Fault(_)) => status,
        _ => ReplyStatus::Malformed(MalformedReply::LegacyFrame { len: buf.len() }),
    }
}

fn parse_code(digits: &[u8]) -> Result<u16, MalformedReply> {
    let mut raw = [0u8; CODE_DIGITS];
    raw.copy_from_slice(&digits[..CODE_DIGITS]);
    if !raw.iter().all(u8::is_ascii_digit) {
        return Err(MalformedReply::InvalidCode(raw));
    }
    Ok(raw
        .iter()
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0')))
}
