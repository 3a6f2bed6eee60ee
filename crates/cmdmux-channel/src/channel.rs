use std::os::unix::io::RawFd;

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::error::{ChannelError, Result};
use crate::transport::Transport;
use crate::wait::{wait_for_any, Pollable, WaitOptions};

const READ_CHUNK_SIZE: usize = 8 * 1024;
const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// A buffered, nonblocking duplex channel over some [`Transport`].
///
/// [`read`](Channel::read) and [`write`](Channel::write) operate on
/// buffers only and never block, so they are safe to call freely.
/// [`update`](Channel::update) is the single operation that touches the
/// transport: it fills the input buffer and drains the output buffer as
/// far as the transport allows right now. Combined with
/// [`wait_for_any`], this lets one caller service arbitrarily many
/// channels with one readiness wait per iteration instead of blocking on
/// each channel in turn.
pub struct Channel<T> {
    transport: T,
    ibuf: BytesMut,
    obuf: BytesMut,
    name: Option<String>,
}

impl<T: Transport> Channel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            ibuf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            obuf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            name: None,
        }
    }

    /// Drain and return everything currently buffered on input. Never
    /// blocks; may return an empty buffer.
    pub fn read(&mut self) -> Bytes {
        self.ibuf.split().freeze()
    }

    /// Append bytes to the output buffer. Performs no I/O; call
    /// [`update`](Channel::update) or [`flush`](Channel::flush) to move
    /// the bytes to the transport.
    pub fn write(&mut self, bytes: &[u8]) {
        self.obuf.extend_from_slice(bytes);
    }

    /// Fill the input buffer and drain the output buffer. This is the
    /// only channel operation that performs I/O.
    ///
    /// Reads repeat until the transport has nothing more right now, then
    /// writes repeat, trimming the output buffer by the bytes actually
    /// accepted, until the transport accepts nothing or the buffer
    /// empties. Returns whether the channel remains open.
    pub fn update(&mut self) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let n = self.transport.read_bytes(&mut chunk)?;
            if n == 0 {
                break;
            }
            trace!(bytes = n, name = self.name(), "channel buffered input");
            self.ibuf.extend_from_slice(&chunk[..n]);
        }

        while !self.obuf.is_empty() {
            let n = self.transport.write_bytes(&self.obuf)?;
            if n == 0 {
                break;
            }
            trace!(bytes = n, name = self.name(), "channel drained output");
            self.obuf.advance(n);
        }

        Ok(self.transport.is_open())
    }

    /// Block until the output buffer has been handed to the transport,
    /// alternating a bounded readiness wait with [`update`](Channel::update).
    ///
    /// Fails with [`ChannelError::ClosedWhileFlushing`] if the channel
    /// closes with output still buffered, since delivery of those bytes
    /// can no longer be guaranteed.
    pub fn flush(&mut self) -> Result<()> {
        while !self.obuf.is_empty() {
            let pollable: &dyn Pollable = self;
            wait_for_any(&[pollable], &WaitOptions::default())?;
            let open = self.update()?;
            if !open && !self.obuf.is_empty() {
                return Err(ChannelError::ClosedWhileFlushing);
            }
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn is_open_for_reading(&self) -> bool {
        self.transport.is_open_for_reading()
    }

    pub fn is_open_for_writing(&self) -> bool {
        self.transport.is_open_for_writing()
    }

    /// Close the write direction of the transport.
    pub fn close_write(&mut self) -> Result<()> {
        self.transport.close_write()
    }

    /// Set a debug name for this channel.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Debug name, defaulting to the transport kind.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.transport.kind())
    }

    pub fn is_read_buffer_empty(&self) -> bool {
        self.ibuf.is_empty()
    }

    pub fn is_write_buffer_empty(&self) -> bool {
        self.obuf.is_empty()
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the channel and return the transport. Buffered data is
    /// discarded.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: Transport> Pollable for Channel<T> {
    fn has_buffered_input(&self) -> bool {
        !self.ibuf.is_empty()
    }

    fn read_fds(&self) -> Vec<RawFd> {
        self.transport.read_fds()
    }

    // Only watch for write readiness while there is output to deliver;
    // an idle descriptor is almost always writable and would make every
    // wait return immediately.
    fn write_fds(&self) -> Vec<RawFd> {
        if self.obuf.is_empty() {
            Vec::new()
        } else {
            self.transport.write_fds()
        }
    }
}
