//! Binary command opcodes.
//!
//! "Short" opcodes are used when the whole transfer fits in one packet;
//! "long" opcodes announce a transfer that spans several slices.

/// Read a float64 array that fits in one packet.
pub const READ_D_ARRAY: u8 = 0xF0;

/// Read a float64 array larger than one packet (first slice).
pub const READ_LD_ARRAY: u8 = 0x41;

/// Read a continuation slice of a float64 array.
pub const READ_LD_SLICE: u8 = 0x42;

/// Read an int32 array that fits in one packet.
pub const READ_I_ARRAY: u8 = 0xF1;

/// Read an int32 array larger than one packet (first slice).
pub const READ_LI_ARRAY: u8 = 0x44;

/// Read a continuation slice of an int32 array.
pub const READ_LI_SLICE: u8 = 0x45;

/// Write a float64 array that fits in one packet.
pub const WRITE_D_ARRAY: u8 = 0xF2;

/// Write one slice of a float64 array larger than one packet.
pub const WRITE_LD_ARRAY: u8 = 0x37;

/// Returns a human-readable name for an opcode.
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        READ_D_ARRAY => "READ_D_ARRAY",
        READ_LD_ARRAY => "READ_LD_ARRAY",
        READ_LD_SLICE => "READ_LD_SLICE",
        READ_I_ARRAY => "READ_I_ARRAY",
        READ_LI_ARRAY => "READ_LI_ARRAY",
        READ_LI_SLICE => "READ_LI_SLICE",
        WRITE_D_ARRAY => "WRITE_D_ARRAY",
        WRITE_LD_ARRAY => "WRITE_LD_ARRAY",
        _ => "UNKNOWN",
    }
}

/// Returns true if the opcode requests array data from the controller.
pub fn is_read(opcode: u8) -> bool {
    matches!(
        opcode,
        READ_D_ARRAY | READ_LD_ARRAY | READ_LD_SLICE | READ_I_ARRAY | READ_LI_ARRAY | READ_LI_SLICE
    )
}

/// Returns true if the opcode sends array data to the controller.
pub fn is_write(opcode: u8) -> bool {
    matches!(opcode, WRITE_D_ARRAY | WRITE_LD_ARRAY)
}
