use std::time::Duration;

/// Errors that can occur on a byte channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the controller.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A write did not complete before its deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// The peer closed the channel.
    #[error("channel closed by peer")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
