use std::os::unix::io::RawFd;

use crate::error::Result;

/// Capability set required of a channel's underlying I/O.
///
/// Implementations must be nonblocking throughout: `read_bytes` and
/// `write_bytes` report "no progress right now" as `Ok(0)` rather than
/// blocking, and closure is observed through the openness accessors.
/// [`Channel`](crate::Channel) owns all buffering; a transport only moves
/// bytes and tracks its own open/closed state.
pub trait Transport {
    /// Short label for this transport kind, used as the default channel
    /// name in diagnostics.
    fn kind(&self) -> &'static str;

    /// True while the transport can still be read from or written to.
    fn is_open(&self) -> bool;

    /// True while the read direction is open. Transports that cannot
    /// half-close report overall openness.
    fn is_open_for_reading(&self) -> bool {
        self.is_open()
    }

    /// True while the write direction is open.
    fn is_open_for_writing(&self) -> bool {
        self.is_open()
    }

    /// Close the write direction, signalling end-of-input to the peer.
    fn close_write(&mut self) -> Result<()>;

    /// Nonblocking read. Returns the number of bytes placed in `buf`;
    /// `Ok(0)` means nothing is available right now, or end-of-stream
    /// (which must flip `is_open_for_reading` to false).
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Nonblocking write. Returns the number of bytes accepted; `Ok(0)`
    /// means the transport cannot accept more right now, or the write
    /// direction has closed (which must flip `is_open_for_writing`).
    fn write_bytes(&mut self, buf: &[u8]) -> Result<usize>;

    /// Descriptors to watch for read readiness. Transports with no
    /// observable readiness (empty here and in `write_fds`) degrade
    /// [`wait_for_any`](crate::wait_for_any) to a busy poll.
    fn read_fds(&self) -> Vec<RawFd> {
        Vec::new()
    }

    /// Descriptors to watch for write readiness.
    fn write_fds(&self) -> Vec<RawFd> {
        Vec::new()
    }
}
