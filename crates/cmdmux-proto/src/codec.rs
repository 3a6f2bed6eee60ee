use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Frame header: tag (1) + big-endian payload length (4).
pub const HEADER_SIZE: usize = 5;

/// Default maximum frame payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Fixed literal marker that opens every command request.
pub const RUN_COMMAND: &str = "runcommand";

/// Longest accepted command word in a request envelope.
const MAX_COMMAND_LEN: usize = 4 * 1024;

/// The fixed set of frame tags.
///
/// `Stdout`, `Stderr` and `Debug` frames carry raw bytes; `Result` is the
/// terminal frame of a response stream and carries exactly 4 bytes, the
/// big-endian signed 32-bit exit status. Nothing may follow a `Result`
/// frame within one round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    Stdout,
    Stderr,
    Debug,
    Result,
}

impl FrameTag {
    /// Decode a wire tag byte. Unknown bytes are rejected rather than
    /// skipped: a stream that has desynchronized would otherwise be
    /// consumed as garbage frame lengths.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'o' => Ok(Self::Stdout),
            b'e' => Ok(Self::Stderr),
            b'd' => Ok(Self::Debug),
            b'r' => Ok(Self::Result),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Stdout => b'o',
            Self::Stderr => b'e',
            Self::Debug => b'd',
            Self::Result => b'r',
        }
    }
}

/// One tagged unit of a response stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub tag: FrameTag,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(tag: FrameTag, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// True for the frame that terminates a response stream.
    pub fn is_terminal(&self) -> bool {
        self.tag == FrameTag::Result
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Maximum frame payload size in bytes. Default: 16 MiB.
    pub max_payload: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Encode one frame into `dst`.
pub fn encode_frame(tag: FrameTag, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(tag.as_byte());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from `src`.
///
/// Returns `Ok(None)` if the buffer does not yet contain a complete
/// frame. On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.is_empty() {
        return Ok(None);
    }

    let tag = FrameTag::from_byte(src[0])?;

    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let payload_len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
    if payload_len > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { tag, payload }))
}

/// Number of wire bytes the next complete frame in `src` occupies, if
/// the header has arrived. Does not validate the tag.
pub(crate) fn peek_frame_len(src: &BytesMut) -> Option<usize> {
    if src.len() < HEADER_SIZE {
        return None;
    }
    let payload_len = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
    Some(HEADER_SIZE + payload_len)
}

/// Decode a result frame's payload: a big-endian signed 32-bit exit
/// status. This is deliberately the one place the byte-order
/// reinterpretation happens.
pub fn decode_exit_status(payload: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| ProtocolError::BadResultPayload { len: payload.len() })?;
    Ok(i32::from_be_bytes(bytes))
}

/// Encode an exit status as a result frame payload.
pub fn encode_exit_status(status: i32) -> [u8; 4] {
    status.to_be_bytes()
}

/// Encode a request envelope: the command word, a newline, the big-endian
/// length of the argument block, and the arguments joined by NUL.
///
/// `argv[0]` is the command word (normally [`RUN_COMMAND`]); the
/// remaining elements are its arguments.
pub fn encode_request<S: AsRef<str>>(argv: &[S], dst: &mut BytesMut) -> Result<()> {
    let Some((command, args)) = argv.split_first() else {
        return Err(ProtocolError::MalformedRequest(
            "empty argument vector".to_string(),
        ));
    };

    let command = command.as_ref();
    if command.is_empty() || command.contains('\n') || command.contains('\0') {
        return Err(ProtocolError::MalformedRequest(format!(
            "invalid command word {command:?}"
        )));
    }
    if command.len() > MAX_COMMAND_LEN {
        return Err(ProtocolError::MalformedRequest(format!(
            "command word too long ({} bytes)",
            command.len()
        )));
    }

    let mut body = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        let arg = arg.as_ref();
        if arg.contains('\0') {
            return Err(ProtocolError::MalformedRequest(format!(
                "argument {i} contains NUL"
            )));
        }
        if i > 0 {
            body.push(0);
        }
        body.extend_from_slice(arg.as_bytes());
    }

    if body.len() > u32::MAX as usize {
        return Err(ProtocolError::PayloadTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }

    dst.reserve(command.len() + 1 + 4 + body.len());
    dst.put_slice(command.as_bytes());
    dst.put_u8(b'\n');
    dst.put_u32(body.len() as u32);
    dst.put_slice(&body);
    Ok(())
}

/// Decode a request envelope from `src`. Returns `Ok(None)` if the
/// buffer does not yet contain a complete envelope; on success, consumes
/// it and returns the argument vector with the command word first.
pub fn decode_request(src: &mut BytesMut) -> Result<Option<Vec<String>>> {
    let Some(newline) = src.iter().position(|&b| b == b'\n') else {
        if src.len() > MAX_COMMAND_LEN {
            return Err(ProtocolError::MalformedRequest(
                "command word too long".to_string(),
            ));
        }
        return Ok(None);
    };

    if src.len() < newline + 1 + 4 {
        return Ok(None);
    }

    let body_len = u32::from_be_bytes([
        src[newline + 1],
        src[newline + 2],
        src[newline + 3],
        src[newline + 4],
    ]) as usize;

    let total = newline + 1 + 4 + body_len;
    if src.len() < total {
        return Ok(None);
    }

    let command = std::str::from_utf8(&src[..newline])
        .map_err(|_| ProtocolError::MalformedRequest("command word is not UTF-8".to_string()))?
        .to_string();

    let body = &src[newline + 5..total];
    let mut argv = vec![command];
    if !body.is_empty() {
        for arg in body.split(|&b| b == 0) {
            let arg = std::str::from_utf8(arg).map_err(|_| {
                ProtocolError::MalformedRequest("argument is not UTF-8".to_string())
            })?;
            argv.push(arg.to_string());
        }
    }

    src.advance(total);
    Ok(Some(argv))
}
