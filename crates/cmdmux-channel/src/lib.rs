//! Buffered, nonblocking I/O channels with readiness-based multiplexing.
//!
//! A [`Channel`] wraps anything with basic duplex I/O characteristics —
//! sockets, pipes, subprocess stdio — behind one nonblocking interface.
//! Reads and writes operate on buffers only; [`Channel::update`] is the
//! single operation that touches the underlying transport, and
//! [`wait_for_any`] multiplexes arbitrarily many channels with one bounded
//! readiness wait.
//!
//! This is the lowest layer of cmdmux. The frame protocol and client
//! session build on the [`Channel`] type provided here.

pub mod channel;
pub mod error;
pub mod transport;
pub mod wait;

#[cfg(unix)]
pub mod exec;
#[cfg(unix)]
pub mod socket;

pub use channel::Channel;
pub use error::{ChannelError, Result};
pub use transport::Transport;
pub use wait::{wait_for_any, Pollable, WaitOptions, DEFAULT_WAIT_TIMEOUT};

#[cfg(unix)]
pub use exec::ExecTransport;
#[cfg(unix)]
pub use socket::SocketTransport;
