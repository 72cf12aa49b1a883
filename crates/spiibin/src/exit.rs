use std::fmt;
use std::io;

use spiibin_frame::FrameError;
use spiibin_link::LinkError;
use spiibin_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const CONTROLLER_ERROR: i32 = 40;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::WriteTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::InvalidRange { .. } | FrameError::InvalidVariable(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Frame(err) => frame_error(context, err),
        LinkError::ShortRead { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::Controller(_)
        | LinkError::Command { .. }
        | LinkError::VariableTooSmall { .. } => {
            CliError::new(CONTROLLER_ERROR, format!("{context}: {err}"))
        }
        LinkError::Config(_) => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::LockPoisoned => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiibin_frame::{ControllerFault, ElementKind, MalformedReply};

    #[test]
    fn controller_faults_map_to_controller_error() {
        let err = LinkError::from(ControllerFault {
            code: 1064,
            opcode: 0xF0,
            legacy: false,
        });
        let cli = link_error("read failed", err);
        assert_eq!(cli.code, CONTROLLER_ERROR);
        assert!(cli.message.contains("#1064"));
    }

    #[test]
    fn short_read_is_timeout() {
        let err = LinkError::ShortRead {
            expected: 69,
            actual: 0,
        };
        assert_eq!(link_error("read failed", err).code, TIMEOUT);
    }

    #[test]
    fn refused_connection_is_failure() {
        let err = TransportError::Connect {
            addr: "127.0.0.1:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(link_error("connect failed", err.into()).code, FAILURE);
    }

    #[test]
    fn request_errors() {
        let usage = frame_error("bad", FrameError::InvalidVariable("1X".to_string()));
        assert_eq!(usage.code, USAGE);

        let unsupported = link_error(
            "write failed",
            FrameError::UnsupportedWrite(ElementKind::Int32).into(),
        );
        assert_eq!(unsupported.code, DATA_INVALID);

        let malformed = link_error("read failed", MalformedReply::BadStart(0x00).into());
        assert_eq!(malformed.code, TRANSPORT_ERROR);
    }
}
