use std::os::unix::io::RawFd;

use bytes::BytesMut;
use tracing::debug;

use cmdmux_channel::{wait_for_any, Channel, Pollable, Transport, WaitOptions};

use crate::codec::{
    decode_frame, encode_request, peek_frame_len, Frame, ProtocolConfig,
};
use crate::error::{ProtocolError, Result};

/// A channel that speaks the tagged-frame protocol.
///
/// Wraps a raw byte [`Channel`] and exposes whole frames: the payload
/// type is fixed at this layer rather than left dynamic. Writes encode a
/// request envelope into the channel's output buffer; reads pump the
/// channel's input buffer through an incremental frame decoder.
pub struct CommandChannel<T: Transport> {
    channel: Channel<T>,
    rbuf: BytesMut,
    config: ProtocolConfig,
}

impl<T: Transport> CommandChannel<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ProtocolConfig::default())
    }

    pub fn with_config(transport: T, config: ProtocolConfig) -> Self {
        Self {
            channel: Channel::new(transport),
            rbuf: BytesMut::new(),
            config,
        }
    }

    /// Read and discard the one hello frame the peer emits when the
    /// transport opens. Must be called once before the first request.
    pub fn read_hello(&mut self) -> Result<()> {
        let frame = self.wait_for_message()?;
        debug!(
            tag = ?frame.tag,
            size = frame.payload.len(),
            "discarded protocol hello frame"
        );
        Ok(())
    }

    /// Encode one request envelope and flush it to the peer.
    ///
    /// `argv[0]` is the command word; see
    /// [`RUN_COMMAND`](crate::RUN_COMMAND).
    pub fn send_request<S: AsRef<str>>(&mut self, argv: &[S]) -> Result<()> {
        let mut buf = BytesMut::new();
        encode_request(argv, &mut buf)?;
        self.channel.write(&buf);
        self.channel.flush()?;
        Ok(())
    }

    /// Try to decode one frame from what is already buffered. Never
    /// blocks and performs no I/O.
    pub fn read_message(&mut self) -> Result<Option<Frame>> {
        let chunk = self.channel.read();
        if !chunk.is_empty() {
            self.rbuf.extend_from_slice(&chunk);
        }
        decode_frame(&mut self.rbuf, self.config.max_payload)
    }

    /// Block until one complete frame arrives.
    ///
    /// Alternates [`Channel::update`] with a bounded readiness wait. A
    /// channel that closes while a decodable frame is still buffered
    /// yields that frame first; closure with no complete frame is
    /// [`ProtocolError::Closed`].
    pub fn wait_for_message(&mut self) -> Result<Frame> {
        loop {
            let open = self.channel.update()?;
            if let Some(frame) = self.read_message()? {
                return Ok(frame);
            }
            // Messages only ever arrive on the read side; once it hits
            // end-of-stream no terminal frame can follow, even if the
            // write direction is still nominally open.
            if !open || !self.channel.is_open_for_reading() {
                return Err(ProtocolError::Closed);
            }
            let pollable: &dyn Pollable = self;
            wait_for_any(&[pollable], &WaitOptions::default())
                .map_err(ProtocolError::Channel)?;
        }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Set a debug name on the underlying channel.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.channel.set_name(name);
    }

    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// Borrow the underlying byte channel.
    pub fn channel(&self) -> &Channel<T> {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut Channel<T> {
        &mut self.channel
    }
}

impl<T: Transport> Pollable for CommandChannel<T> {
    // Partial frame bytes do not count as buffered input: reporting them
    // would turn the wait in `wait_for_message` into a hot spin while the
    // rest of the frame is still in flight.
    fn has_buffered_input(&self) -> bool {
        if self.channel.has_buffered_input() {
            return true;
        }
        match peek_frame_len(&self.rbuf) {
            Some(len) => self.rbuf.len() >= len,
            None => false,
        }
    }

    fn read_fds(&self) -> Vec<RawFd> {
        self.channel.read_fds()
    }

    fn write_fds(&self) -> Vec<RawFd> {
        self.channel.write_fds()
    }
}
