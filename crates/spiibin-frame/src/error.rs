use crate::descriptor::ElementKind;

/// Errors that can occur while building binary commands.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An index range ends before it starts.
    #[error("invalid index range ({start},{end})")]
    InvalidRange { start: u32, end: u32 },

    /// The variable name cannot be sent in a binary command.
    #[error("invalid variable name {0:?}")]
    InvalidVariable(String),

    /// A frame body exceeds the packet data limit.
    #[error("frame body too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The transfer cannot be expressed within the protocol's packet and slice limits.
    #[error("protocol limit: {0}")]
    ProtocolLimit(String),

    /// There is no binary write command for this element type.
    #[error("binary writes of {0} arrays are not supported")]
    UnsupportedWrite(ElementKind),

    /// The supplied data does not match the descriptor's element count.
    #[error("data length mismatch ({actual} bytes, descriptor needs {expected})")]
    DataLength { expected: usize, actual: usize },

    /// A slice index lies beyond the data described by the command.
    #[error("slice {slice} is out of range for {data_bytes} data bytes")]
    SliceOutOfRange { slice: u32, data_bytes: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
