//! Run commands against a persistent local worker process.
//!
//! cmdmux keeps one long-lived connection per workspace to a command
//! proxy daemon, so repeated commands skip process startup cost.
//!
//! # Crate Structure
//!
//! - [`channel`] — Buffered nonblocking channels with readiness-based
//!   multiplexing over local transports
//! - [`proto`] — The tagged-frame wire protocol and message channel
//! - [`client`] — Endpoint address derivation and client sessions

/// Re-export channel types.
pub mod channel {
    pub use cmdmux_channel::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use cmdmux_proto::*;
}

/// Re-export client types.
pub mod client {
    pub use cmdmux_client::*;
}
