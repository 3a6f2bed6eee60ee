//! The multiplexed frame protocol spoken between a client and a command
//! proxy.
//!
//! Every unit on the wire is a frame: a one-byte ASCII tag, a 4-byte
//! big-endian payload length, and the payload. A round trip is one
//! request envelope (the `runcommand` marker plus the caller's argument
//! vector) answered by a stream of `o`/`e`/`d` frames terminated by
//! exactly one `r` frame carrying the signed 32-bit exit status.
//!
//! [`CommandChannel`] layers this framing on a buffered
//! [`Channel`](cmdmux_channel::Channel) and provides the blocking
//! "wait for one message" primitive the client session loops on.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{
    decode_exit_status, decode_frame, decode_request, encode_exit_status, encode_frame,
    encode_request, Frame, FrameTag, ProtocolConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, RUN_COMMAND,
};
pub use error::{ProtocolError, Result};
pub use message::CommandChannel;
