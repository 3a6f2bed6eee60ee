use cmdmux_channel::ChannelError;

/// Errors that can occur while encoding or decoding protocol traffic.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Error from the underlying channel or transport.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The channel closed before a complete message arrived. A round
    /// trip that ends this way must not be reported as a truncated
    /// success.
    #[error("channel closed before a complete message arrived")]
    Closed,

    /// The stream carried a tag byte outside the protocol's fixed set.
    #[error("unknown frame tag 0x{0:02x}")]
    UnknownTag(u8),

    /// A result frame's payload was not exactly 4 bytes.
    #[error("result frame payload must be 4 bytes, got {len}")]
    BadResultPayload { len: usize },

    /// A frame payload exceeds the configured maximum.
    #[error("frame payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A request envelope could not be encoded or decoded.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
