use std::path::PathBuf;

use cmdmux_channel::ChannelError;
use cmdmux_proto::ProtocolError;

/// Errors surfaced to callers of a client session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The workspace path could not be resolved to a canonical form.
    #[error("failed to resolve workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The derived socket path exceeds the platform limit.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Transport/channel failure, including connection refusal with the
    /// native error code and message.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Protocol violation, including closure before a terminal frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
