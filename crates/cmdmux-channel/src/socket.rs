use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::debug;

use crate::error::{ChannelError, Result};
use crate::transport::Transport;

/// Nonblocking Unix-domain stream socket transport.
///
/// Openness is tracked per direction: reading end-of-stream closes the
/// read side, a broken pipe closes the write side, and the transport as
/// a whole stays open while either direction does.
#[derive(Debug)]
pub struct SocketTransport {
    stream: UnixStream,
    read_open: bool,
    write_open: bool,
}

impl SocketTransport {
    /// Connect to a listening Unix domain socket.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| ChannelError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to unix domain socket");
        Self::from_stream(stream)
    }

    /// Create a connected loopback pair, mostly useful for tests and
    /// in-process plumbing.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::from_stream(left)?, Self::from_stream(right)?))
    }

    /// Wrap an already-connected stream, switching it to nonblocking mode.
    pub fn from_stream(stream: UnixStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            read_open: true,
            write_open: true,
        })
    }
}

impl Transport for SocketTransport {
    fn kind(&self) -> &'static str {
        "socket"
    }

    fn is_open(&self) -> bool {
        self.read_open || self.write_open
    }

    fn is_open_for_reading(&self) -> bool {
        self.read_open
    }

    fn is_open_for_writing(&self) -> bool {
        self.write_open
    }

    fn close_write(&mut self) -> Result<()> {
        if self.write_open {
            self.stream.shutdown(Shutdown::Write)?;
            self.write_open = false;
        }
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.read_open {
            return Ok(0);
        }
        match self.stream.read(buf) {
            Ok(0) => {
                debug!("socket read side reached end of stream");
                self.read_open = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) if is_disconnect(&e) => {
                self.read_open = false;
                Ok(0)
            }
            Err(e) => Err(ChannelError::Io(e)),
        }
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.write_open || buf.is_empty() {
            return Ok(0);
        }
        match self.stream.write(buf) {
            Ok(0) => {
                self.write_open = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) if is_disconnect(&e) => {
                debug!("socket write side closed by peer");
                self.write_open = false;
                Ok(0)
            }
            Err(e) => Err(ChannelError::Io(e)),
        }
    }

    fn read_fds(&self) -> Vec<RawFd> {
        if self.read_open {
            vec![self.stream.as_raw_fd()]
        } else {
            Vec::new()
        }
    }

    fn write_fds(&self) -> Vec<RawFd> {
        if self.write_open {
            vec![self.stream.as_raw_fd()]
        } else {
            Vec::new()
        }
    }
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}
