use std::path::{Path, PathBuf};

use tracing::{debug, info};

use cmdmux_channel::SocketTransport;
use cmdmux_proto::{decode_exit_status, CommandChannel, FrameTag, RUN_COMMAND};

use crate::address::socket_path;
use crate::error::Result;

/// Outcome of one command round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Signed exit status of the command as reported by the worker.
    /// Negative values follow the convention of "terminated by signal".
    pub status: i32,
    /// Accumulated stdout bytes, in arrival order.
    pub stdout: Vec<u8>,
    /// Accumulated stderr bytes, in arrival order.
    pub stderr: Vec<u8>,
}

enum SessionState {
    Disconnected,
    Connected(CommandChannel<SocketTransport>),
}

/// A client session bound to one workspace.
///
/// The connection to the proxy is established lazily on the first
/// [`execute_command`](Session::execute_command) call and reused for
/// every call after that, so repeated commands pay the connect and
/// handshake cost once.
///
/// At most one command can be in flight per session: the protocol
/// carries no request-correlation identifier, so concurrent callers
/// sharing one session must serialize access externally. `&mut self`
/// on `execute_command` enforces this within a single thread.
pub struct Session {
    workspace: PathBuf,
    state: SessionState,
}

impl Session {
    /// Create a session for the given workspace. No connection is made
    /// until the first command runs.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            state: SessionState::Disconnected,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    /// Execute one command against the workspace's worker and block
    /// until its terminal frame arrives.
    ///
    /// Sends exactly one request (the `runcommand` marker plus `argv`)
    /// and reads tagged frames until the result frame, accumulating
    /// stdout and stderr. Fails with a connection error if the proxy is
    /// unreachable, or a protocol error if the connection closes before
    /// the terminal frame; no retry is attempted here, since the proxy
    /// may already have started executing the command.
    pub fn execute_command<S: AsRef<str>>(&mut self, argv: &[S]) -> Result<CommandResult> {
        let mut channel = match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Connected(channel) => channel,
            SessionState::Disconnected => self.connect()?,
        };

        match run_round_trip(&mut channel, argv) {
            Ok(result) => {
                self.state = SessionState::Connected(channel);
                Ok(result)
            }
            // The broken connection is dropped; the session returns to
            // Disconnected and the caller decides whether to retry.
            Err(err) => Err(err),
        }
    }

    fn connect(&self) -> Result<CommandChannel<SocketTransport>> {
        let path = socket_path(&self.workspace)?;
        debug!(path = %path.display(), "connecting to command proxy");

        let transport = SocketTransport::connect(&path)?;
        let mut channel = CommandChannel::new(transport);
        channel.set_name(format!("proxy:{}", self.workspace.display()));

        // The proxy opens every connection with one frame of capability
        // and encoding metadata. Only `runcommand` is ever used, so the
        // frame is read and discarded.
        channel.read_hello()?;
        info!(workspace = %self.workspace.display(), "command proxy session established");

        Ok(channel)
    }
}

fn run_round_trip<S: AsRef<str>>(
    channel: &mut CommandChannel<SocketTransport>,
    argv: &[S],
) -> Result<CommandResult> {
    let mut request: Vec<&str> = Vec::with_capacity(argv.len() + 1);
    request.push(RUN_COMMAND);
    request.extend(argv.iter().map(AsRef::as_ref));
    channel.send_request(&request)?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    loop {
        let frame = channel.wait_for_message()?;
        match frame.tag {
            FrameTag::Stdout => stdout.extend_from_slice(&frame.payload),
            FrameTag::Stderr => stderr.extend_from_slice(&frame.payload),
            FrameTag::Debug => {
                debug!(size = frame.payload.len(), "dropping debug frame");
            }
            FrameTag::Result => {
                let status = decode_exit_status(&frame.payload)?;
                debug!(status, "command round trip complete");
                return Ok(CommandResult {
                    status,
                    stdout,
                    stderr,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::thread::{self, JoinHandle};

    use bytes::BytesMut;

    use cmdmux_channel::ChannelError;
    use cmdmux_proto::{
        decode_request, encode_exit_status, encode_frame, ProtocolError,
    };

    use super::*;
    use crate::address::SOCKET_DIR;
    use crate::error::ClientError;

    fn temp_workspace(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cmdmux-session-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(dir.join(SOCKET_DIR)).unwrap();
        dir
    }

    fn bind_proxy(workspace: &Path) -> UnixListener {
        UnixListener::bind(socket_path(workspace).unwrap()).unwrap()
    }

    fn send_hello(stream: &mut UnixStream) {
        let mut wire = BytesMut::new();
        encode_frame(
            FrameTag::Stdout,
            b"capabilities: runcommand\nencoding: UTF-8",
            &mut wire,
        )
        .unwrap();
        stream.write_all(&wire).unwrap();
    }

    fn read_request(stream: &mut UnixStream) -> Vec<String> {
        let mut buf = BytesMut::new();
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(argv) = decode_request(&mut buf).unwrap() {
                return argv;
            }
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "client closed before a complete request");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn send_frames(stream: &mut UnixStream, frames: &[(FrameTag, &[u8])]) {
        let mut wire = BytesMut::new();
        for (tag, payload) in frames {
            encode_frame(*tag, payload, &mut wire).unwrap();
        }
        stream.write_all(&wire).unwrap();
    }

    fn spawn_proxy(
        listener: UnixListener,
        serve: impl FnOnce(UnixStream) + Send + 'static,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            send_hello(&mut stream);
            serve(stream);
        })
    }

    #[test]
    fn accumulates_streams_and_decodes_negative_status() {
        let dir = temp_workspace("streams");
        let listener = bind_proxy(&dir);

        let proxy = spawn_proxy(listener, |mut stream| {
            let argv = read_request(&mut stream);
            assert_eq!(argv, vec!["runcommand", "log", "-l", "5"]);
            send_frames(
                &mut stream,
                &[
                    (FrameTag::Stdout, b"AB"),
                    (FrameTag::Stderr, b"C"),
                    (FrameTag::Stdout, b"D"),
                    (FrameTag::Result, &encode_exit_status(-1)),
                ],
            );
        });

        let mut session = Session::new(&dir);
        let result = session.execute_command(&["log", "-l", "5"]).unwrap();
        assert_eq!(result.status, -1);
        assert_eq!(result.stdout, b"ABD");
        assert_eq!(result.stderr, b"C");

        proxy.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn decodes_positive_status() {
        let dir = temp_workspace("positive");
        let listener = bind_proxy(&dir);

        let proxy = spawn_proxy(listener, |mut stream| {
            read_request(&mut stream);
            send_frames(&mut stream, &[(FrameTag::Result, &[0x00, 0x00, 0x00, 0x01])]);
        });

        let mut session = Session::new(&dir);
        let result = session.execute_command(&["status"]).unwrap();
        assert_eq!(result.status, 1);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.is_empty());

        proxy.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn debug_frames_are_ignored() {
        let dir = temp_workspace("debug");
        let listener = bind_proxy(&dir);

        let proxy = spawn_proxy(listener, |mut stream| {
            read_request(&mut stream);
            send_frames(
                &mut stream,
                &[
                    (FrameTag::Debug, b"worker attached"),
                    (FrameTag::Stdout, b"real"),
                    (FrameTag::Debug, b"timing: 3ms"),
                    (FrameTag::Result, &encode_exit_status(0)),
                ],
            );
        });

        let mut session = Session::new(&dir);
        let result = session.execute_command(&["id"]).unwrap();
        assert_eq!(result.status, 0);
        assert_eq!(result.stdout, b"real");

        proxy.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn close_before_result_is_a_protocol_error() {
        let dir = temp_workspace("truncated");
        let listener = bind_proxy(&dir);

        let proxy = spawn_proxy(listener, |mut stream| {
            read_request(&mut stream);
            send_frames(&mut stream, &[(FrameTag::Stdout, b"partial")]);
            // Drop without a result frame.
        });

        let mut session = Session::new(&dir);
        let err = session.execute_command(&["pull"]).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::Closed)
        ));
        assert!(!session.is_connected());

        proxy.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_tag_fails_the_round_trip() {
        let dir = temp_workspace("unknown-tag");
        let listener = bind_proxy(&dir);

        let proxy = spawn_proxy(listener, |mut stream| {
            read_request(&mut stream);
            stream.write_all(b"x\x00\x00\x00\x00").unwrap();
        });

        let mut session = Session::new(&dir);
        let err = session.execute_command(&["heads"]).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::UnknownTag(b'x'))
        ));

        proxy.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn session_reuses_one_connection_for_sequential_commands() {
        let dir = temp_workspace("reuse");
        let listener = bind_proxy(&dir);

        let proxy = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            send_hello(&mut stream);

            for expected in [vec!["runcommand", "first"], vec!["runcommand", "second"]] {
                let argv = read_request(&mut stream);
                assert_eq!(argv, expected);
                send_frames(&mut stream, &[(FrameTag::Result, &encode_exit_status(0))]);
            }

            // A client that reconnected per command would have queued a
            // second connection here.
            listener.set_nonblocking(true).unwrap();
            assert!(
                listener.accept().is_err(),
                "client opened more than one connection"
            );
        });

        let mut session = Session::new(&dir);
        assert!(!session.is_connected());
        assert_eq!(session.execute_command(&["first"]).unwrap().status, 0);
        assert!(session.is_connected());
        assert_eq!(session.execute_command(&["second"]).unwrap().status, 0);

        proxy.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreachable_proxy_surfaces_native_connect_error() {
        let dir = temp_workspace("refused");
        // Workspace exists but nothing listens.

        let mut session = Session::new(&dir);
        let err = session.execute_command(&["status"]).unwrap_err();
        match err {
            ClientError::Channel(ChannelError::Connect { path, source }) => {
                assert_eq!(path, socket_path(&dir).unwrap());
                assert!(source.raw_os_error().is_some());
            }
            other => panic!("expected Connect error, got {other:?}"),
        }
        assert!(!session.is_connected());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn large_stdout_is_accumulated_in_order() {
        let dir = temp_workspace("large");
        let listener = bind_proxy(&dir);

        let expected: Vec<u8> = (0..200_000).map(|i| (i % 251) as u8).collect();
        let chunks: Vec<Vec<u8>> = expected.chunks(7_000).map(<[u8]>::to_vec).collect();

        let proxy = spawn_proxy(listener, move |mut stream| {
            read_request(&mut stream);
            for chunk in &chunks {
                send_frames(&mut stream, &[(FrameTag::Stdout, chunk)]);
            }
            send_frames(&mut stream, &[(FrameTag::Result, &encode_exit_status(0))]);
        });

        let mut session = Session::new(&dir);
        let result = session.execute_command(&["cat", "bigfile"]).unwrap();
        assert_eq!(result.status, 0);
        assert_eq!(result.stdout, expected);

        proxy.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
