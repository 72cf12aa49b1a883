use spiibin_frame::{ControllerFault, FrameError, MalformedReply};
use spiibin_transport::TransportError;

/// Errors that can occur during an array transfer.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Channel-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request could not be encoded or packetized.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Fewer reply bytes arrived than the exchange requires.
    #[error("short read ({actual} of {expected} bytes)")]
    ShortRead { expected: usize, actual: usize },

    /// The channel accepted only part of a request.
    #[error("short write ({actual} of {expected} bytes)")]
    ShortWrite { expected: usize, actual: usize },

    /// The controller stopped sending slices before the array was complete.
    #[error("array read incomplete ({received} of {expected} bytes)")]
    Incomplete { expected: usize, received: usize },

    /// The controller reported a fault in a binary error frame.
    #[error(transparent)]
    Controller(#[from] ControllerFault),

    /// A reply failed structural validation.
    #[error("malformed reply: {0}")]
    Malformed(#[from] MalformedReply),

    /// The controller rejected an ASCII command.
    #[error("controller error #{code} for `{command}`")]
    Command { command: String, code: u16 },

    /// An ASCII response could not be interpreted.
    #[error("unexpected response to `{command}`: {response:?}")]
    UnexpectedResponse { command: String, response: String },

    /// A global variable exists but is smaller than the descriptor.
    #[error("global variable {variable} is too small for {descriptor}")]
    VariableTooSmall { variable: String, descriptor: String },

    /// Invalid link configuration.
    #[error("invalid link configuration: {0}")]
    Config(String),

    /// Another thread panicked while holding the link.
    #[error("link lock poisoned")]
    LockPoisoned,
}

/// Coarse classification callers can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Channel failure, timeout, or short read.
    Transport,
    /// The controller reported a numeric fault.
    Controller,
    /// A reply could not be parsed.
    Malformed,
    /// The request cannot be expressed within protocol limits.
    ProtocolLimit,
}

impl LinkError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LinkError::Transport(_)
            | LinkError::ShortRead { .. }
            | LinkError::ShortWrite { .. }
            | LinkError::LockPoisoned => ErrorCategory::Transport,
            LinkError::Controller(_)
            | LinkError::Command { .. }
            | LinkError::VariableTooSmall { .. } => ErrorCategory::Controller,
            LinkError::Malformed(_)
            | LinkError::Incomplete { .. }
            | LinkError::UnexpectedResponse { .. } => ErrorCategory::Malformed,
            LinkError::Frame(_) | LinkError::Config(_) => ErrorCategory::ProtocolLimit,
        }
    }

    /// Controller error number, if the controller reported one.
    pub fn controller_code(&self) -> Option<u16> {
        match self {
            LinkError::Controller(fault) => Some(fault.code),
            LinkError::Command { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
