use std::fmt;

use crate::error::{FrameError, Result};
use crate::opcode;

/// Element type of a controller array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// 64-bit IEEE real (`REAL` variables).
    Float64,
    /// 32-bit signed integer (`INT` variables).
    Int32,
}

impl ElementKind {
    /// Bytes per element on the wire.
    pub fn size(self) -> usize {
        match self {
            ElementKind::Float64 => 8,
            ElementKind::Int32 => 4,
        }
    }

    /// Data-size byte placed after the `%??`/`%>>` prefix.
    pub fn data_size_byte(self) -> u8 {
        self.size() as u8
    }

    /// Opcode for a read that fits in one packet.
    pub fn short_read_opcode(self) -> u8 {
        match self {
            ElementKind::Float64 => opcode::READ_D_ARRAY,
            ElementKind::Int32 => opcode::READ_I_ARRAY,
        }
    }

    /// Opcode for the first packet of a multi-packet read.
    pub fn long_read_opcode(self) -> u8 {
        match self {
            ElementKind::Float64 => opcode::READ_LD_ARRAY,
            ElementKind::Int32 => opcode::READ_LI_ARRAY,
        }
    }

    /// Opcode for a continuation slice of a multi-packet read.
    pub fn slice_read_opcode(self) -> u8 {
        match self {
            ElementKind::Float64 => opcode::READ_LD_SLICE,
            ElementKind::Int32 => opcode::READ_LI_SLICE,
        }
    }

    /// Write opcodes as `(single packet, sliced)`, if the controller has any.
    pub fn write_opcodes(self) -> Option<(u8, u8)> {
        match self {
            ElementKind::Float64 => Some((opcode::WRITE_D_ARRAY, opcode::WRITE_LD_ARRAY)),
            ElementKind::Int32 => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Float64 => f.write_str("float64"),
            ElementKind::Int32 => f.write_str("int32"),
        }
    }
}

/// Inclusive index range of one array dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    pub start: u32,
    pub end: u32,
}

impl IndexRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if end < start {
            return Err(FrameError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A single index.
    pub fn scalar(index: u32) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    /// Number of indices covered.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    /// True when the range covers more than one index.
    pub fn is_spanning(&self) -> bool {
        self.end > self.start
    }
}

/// Dimensionality of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayShape {
    Scalar,
    OneDimensional,
    TwoDimensional,
}

/// Names a block of a controller variable: `VAR(d1s,d1e)(d2s,d2e)`.
///
/// Two-dimensional data is row-major: `dim1` selects the row and `dim2`
/// varies fastest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayDescriptor {
    pub variable: String,
    pub dim1: IndexRange,
    pub dim2: IndexRange,
}

impl ArrayDescriptor {
    /// Descriptor for element `(0)(0)` of `variable`; widen it with
    /// [`dim1`](Self::dim1) and [`dim2`](Self::dim2).
    pub fn new(variable: impl Into<String>) -> Result<Self> {
        Self::with_dims(variable, IndexRange::scalar(0), IndexRange::scalar(0))
    }

    pub fn with_dims(variable: impl Into<String>, dim1: IndexRange, dim2: IndexRange) -> Result<Self> {
        let variable = variable.into();
        validate_variable(&variable)?;
        Ok(Self {
            variable,
            dim1,
            dim2,
        })
    }

    /// Set the first-dimension range.
    pub fn dim1(mut self, start: u32, end: u32) -> Result<Self> {
        self.dim1 = IndexRange::new(start, end)?;
        Ok(self)
    }

    /// Set the second-dimension range.
    pub fn dim2(mut self, start: u32, end: u32) -> Result<Self> {
        self.dim2 = IndexRange::new(start, end)?;
        Ok(self)
    }

    /// ASCII form carried in every binary command.
    pub fn ascii(&self) -> String {
        format!(
            "{}({},{})({},{})",
            self.variable, self.dim1.start, self.dim1.end, self.dim2.start, self.dim2.end
        )
    }

    pub fn ascii_len(&self) -> usize {
        self.ascii().len()
    }

    pub fn shape(&self) -> ArrayShape {
        if self.dim2.is_spanning() {
            ArrayShape::TwoDimensional
        } else if self.dim1.is_spanning() {
            ArrayShape::OneDimensional
        } else {
            ArrayShape::Scalar
        }
    }

    /// Elements covered by the block; fails when the count overflows `usize`.
    pub fn num_elements(&self) -> Result<usize> {
        self.dim1
            .len()
            .checked_mul(self.dim2.len())
            .ok_or_else(|| FrameError::ProtocolLimit(format!("{self} has too many elements")))
    }

    /// Elements per row (the `dim2` span).
    pub fn row_len(&self) -> usize {
        self.dim2.len()
    }

    /// Number of data bytes covered by this descriptor.
    pub fn data_bytes(&self, kind: ElementKind) -> Result<usize> {
        self.num_elements()?
            .checked_mul(kind.size())
            .ok_or_else(|| FrameError::ProtocolLimit(format!("{self} has too many {kind} bytes")))
    }
}

impl fmt::Display for ArrayDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ascii())
    }
}

fn validate_variable(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_first && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(FrameError::InvalidVariable(name.to_string()))
    }
}
