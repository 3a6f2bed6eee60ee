use std::path::PathBuf;

/// Errors that can occur on a channel or its transport.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to spawn a subprocess transport.
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the underlying transport.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel closed with output still buffered. Delivery of the
    /// remaining bytes cannot be guaranteed.
    #[error("channel closed while flushing buffered output")]
    ClosedWhileFlushing,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
