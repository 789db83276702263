use std::fmt;
use std::io;

use ipclink_client::ClientError;
use ipclink_frame::FrameError;
use ipclink_transport::TransportError;

// Exit codes follow sysexits-style semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
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
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } | TransportError::PathTooLong { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidMagic | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Frame(err) => frame_error(context, err),
        ClientError::Json(_)
        | ClientError::MalformedEnvelope(_)
        | ClientError::UnknownEnvelopeType(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::EndpointNotListening(_) => {
            CliError::new(HEALTH_CHECK_FAILED, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_endpoint_is_usage_error() {
        let err = transport_error(
            "resolve failed",
            TransportError::InvalidEndpoint {
                name: "a/b".to_string(),
                reason: "name must not contain path separators",
            },
        );
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("resolve failed: "));
    }

    #[test]
    fn permission_denied_maps_through_client_error() {
        let err = client_error(
            "bind failed",
            ClientError::Transport(TransportError::Io(io::Error::from(
                io::ErrorKind::PermissionDenied,
            ))),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn not_listening_is_health_check_failure() {
        let err = client_error("probe", ClientError::EndpointNotListening("svc".into()));
        assert_eq!(err.code, HEALTH_CHECK_FAILED);
        assert_eq!(err.to_string(), "probe: svc is not listening");
    }
}
