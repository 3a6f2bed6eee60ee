use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::error::{ChannelError, Result};

/// Default bound on one readiness wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// What [`wait_for_any`] needs to know about a channel.
///
/// Implemented by [`Channel`](crate::Channel) and by message-level
/// channels that layer their own decode buffers on top of it.
pub trait Pollable {
    /// True if the channel holds unconsumed input. Waiting on descriptors
    /// would be wrong in that case: the data the caller expects may never
    /// make the descriptor readable again.
    fn has_buffered_input(&self) -> bool;

    /// Descriptors to watch for read readiness.
    fn read_fds(&self) -> Vec<RawFd>;

    /// Descriptors to watch for write readiness.
    fn write_fds(&self) -> Vec<RawFd>;
}

/// Options for [`wait_for_any`]: extra descriptors to fold into the wait
/// and the timeout bounding it.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Additional descriptors to watch for read readiness.
    pub read: Vec<RawFd>,
    /// Additional descriptors to watch for write readiness.
    pub write: Vec<RawFd>,
    /// Upper bound on the blocking wait.
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            read: Vec::new(),
            write: Vec::new(),
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl WaitOptions {
    /// Options with an explicit timeout and no extra descriptors.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Wait for activity on any of `channels`.
///
/// Returns immediately when any channel already has buffered input, when
/// any channel exposes no descriptors at all (such channels degrade to a
/// busy poll — the caller must keep updating them), or when there is
/// nothing to wait on. Otherwise performs one `poll(2)` over the merged
/// descriptor sets, bounded by `options.timeout`. A timeout or `EINTR`
/// counts as a normal wakeup; the caller updates its channels and decides
/// what to do next.
pub fn wait_for_any(channels: &[&dyn Pollable], options: &WaitOptions) -> Result<()> {
    let mut read = options.read.clone();
    let mut write = options.write.clone();

    for channel in channels {
        if channel.has_buffered_input() {
            return Ok(());
        }

        let r = channel.read_fds();
        let w = channel.write_fds();
        if r.is_empty() && w.is_empty() {
            return Ok(());
        }

        read.extend(r);
        write.extend(w);
    }

    if read.is_empty() && write.is_empty() {
        return Ok(());
    }

    let mut fds: Vec<libc::pollfd> = Vec::with_capacity(read.len() + write.len());
    for fd in read {
        fds.push(libc::pollfd {
            fd,
            events: libc::POLLIN | libc::POLLPRI,
            revents: 0,
        });
    }
    for fd in write {
        fds.push(libc::pollfd {
            fd,
            events: libc::POLLOUT,
            revents: 0,
        });
    }

    let timeout_ms = i32::try_from(options.timeout.as_millis()).unwrap_or(i32::MAX);

    // SAFETY: `fds` is a valid, exclusively owned slice of pollfd for the
    // length passed, and poll does not retain the pointer past the call.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            return Ok(());
        }
        return Err(ChannelError::Io(err));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::channel::Channel;
    use crate::socket::SocketTransport;

    struct UnselectableChannel;

    impl Pollable for UnselectableChannel {
        fn has_buffered_input(&self) -> bool {
            false
        }
        fn read_fds(&self) -> Vec<RawFd> {
            Vec::new()
        }
        fn write_fds(&self) -> Vec<RawFd> {
            Vec::new()
        }
    }

    #[test]
    fn returns_immediately_with_no_channels() {
        let start = Instant::now();
        wait_for_any(&[], &WaitOptions::default()).unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn returns_immediately_for_unselectable_channel() {
        let start = Instant::now();
        let channel = UnselectableChannel;
        wait_for_any(&[&channel], &WaitOptions::default()).unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn returns_immediately_when_input_is_buffered() {
        let (ta, tb) = SocketTransport::pair().unwrap();
        let mut a = Channel::new(ta);
        let mut b = Channel::new(tb);

        a.write(b"wake up");
        a.update().unwrap();
        // Move the bytes into b's input buffer so descriptors are quiet.
        let deadline = Instant::now() + Duration::from_secs(5);
        while !b.has_buffered_input() {
            b.update().unwrap();
            assert!(Instant::now() < deadline);
        }

        let start = Instant::now();
        let pollable: &dyn Pollable = &b;
        wait_for_any(
            &[pollable],
            &WaitOptions::with_timeout(Duration::from_secs(10)),
        )
        .unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn wait_is_bounded_by_timeout() {
        let (ta, _tb) = SocketTransport::pair().unwrap();
        let a = Channel::new(ta);

        let start = Instant::now();
        let pollable: &dyn Pollable = &a;
        wait_for_any(
            &[pollable],
            &WaitOptions::with_timeout(Duration::from_millis(50)),
        )
        .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(40), "returned too early");
        assert!(elapsed < Duration::from_secs(5), "did not respect timeout");
    }

    #[test]
    fn extra_read_descriptor_wakes_the_wait() {
        let (ta, _tb) = SocketTransport::pair().unwrap();
        let a = Channel::new(ta);

        // A loopback pair with data pending on the extra descriptor.
        let (mut extra_w, extra_r) = std::os::unix::net::UnixStream::pair().unwrap();
        std::io::Write::write_all(&mut extra_w, b"x").unwrap();

        let options = WaitOptions {
            read: vec![std::os::unix::io::AsRawFd::as_raw_fd(&extra_r)],
            write: Vec::new(),
            timeout: Duration::from_secs(10),
        };

        let start = Instant::now();
        let pollable: &dyn Pollable = &a;
        wait_for_any(&[pollable], &options).unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
