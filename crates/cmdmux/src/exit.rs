use std::fmt;
use std::io;

use cmdmux_channel::ChannelError;
use cmdmux_client::ClientError;
use cmdmux_proto::ProtocolError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
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
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Connect { source, .. }
        | ChannelError::Spawn { source, .. }
        | ChannelError::Io(source) => io_error(context, source),
        other @ ChannelError::ClosedWhileFlushing => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {other}"))
        }
    }
}

pub fn protocol_error(context: &str, err: ProtocolError) -> CliError {
    match err {
        ProtocolError::Channel(err) => channel_error(context, err),
        ProtocolError::Closed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        ProtocolError::UnknownTag(_)
        | ProtocolError::BadResultPayload { .. }
        | ProtocolError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ProtocolError::MalformedRequest(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Channel(err) => channel_error(context, err),
        ClientError::Protocol(err) => protocol_error(context, err),
        ClientError::Workspace { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
    }
}
