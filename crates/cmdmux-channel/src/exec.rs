use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::debug;

use crate::error::{ChannelError, Result};
use crate::transport::Transport;

/// Subprocess stdio transport: writes go to the child's stdin, reads come
/// from its stdout.
///
/// Both pipes are switched to nonblocking mode so the transport fits the
/// [`Transport`] contract. `close_write` drops the stdin handle, which the
/// child observes as end-of-input. Dropping the transport kills and reaps
/// the child.
#[derive(Debug)]
pub struct ExecTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    label: String,
}

impl ExecTransport {
    /// Spawn `command` with piped stdin/stdout and wrap its stdio.
    pub fn spawn(mut command: Command) -> Result<Self> {
        let label = command.get_program().to_string_lossy().into_owned();
        command.stdin(Stdio::piped()).stdout(Stdio::piped());

        let mut child = command.spawn().map_err(|e| ChannelError::Spawn {
            command: label.clone(),
            source: e,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| ChannelError::Spawn {
            command: label.clone(),
            source: std::io::Error::other("child stdin was not piped"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ChannelError::Spawn {
            command: label.clone(),
            source: std::io::Error::other("child stdout was not piped"),
        })?;

        set_nonblocking(stdin.as_raw_fd())?;
        set_nonblocking(stdout.as_raw_fd())?;

        debug!(command = %label, pid = child.id(), "spawned subprocess transport");

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: Some(stdout),
            label,
        })
    }

    /// Process id of the child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Transport for ExecTransport {
    fn kind(&self) -> &'static str {
        "exec"
    }

    fn is_open(&self) -> bool {
        self.is_open_for_reading() || self.is_open_for_writing()
    }

    fn is_open_for_reading(&self) -> bool {
        self.stdout.is_some()
    }

    fn is_open_for_writing(&self) -> bool {
        self.stdin.is_some()
    }

    fn close_write(&mut self) -> Result<()> {
        if self.stdin.take().is_some() {
            debug!(command = %self.label, "closed stdin of subprocess transport");
        }
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(0);
        };
        match stdout.read(buf) {
            Ok(0) => {
                debug!(command = %self.label, "subprocess stdout reached end of stream");
                self.stdout = None;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(ChannelError::Io(e)),
        }
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<usize> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(0);
        };
        if buf.is_empty() {
            return Ok(0);
        }
        match stdin.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(command = %self.label, "subprocess stdin pipe broken");
                self.stdin = None;
                Ok(0)
            }
            Err(e) => Err(ChannelError::Io(e)),
        }
    }

    fn read_fds(&self) -> Vec<RawFd> {
        self.stdout.as_ref().map(AsRawFd::as_raw_fd).into_iter().collect()
    }

    fn write_fds(&self) -> Vec<RawFd> {
        self.stdin.as_ref().map(AsRawFd::as_raw_fd).into_iter().collect()
    }
}

impl Drop for ExecTransport {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn set_nonblocking(fd: RawFd) -> Result<()> {
    // SAFETY: `fd` is an open descriptor owned by this process; F_GETFL and
    // F_SETFL do not touch memory.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(ChannelError::Io(std::io::Error::last_os_error()));
    }
    // SAFETY: as above.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(ChannelError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn echoes_through_cat() {
        let mut transport = ExecTransport::spawn(Command::new("cat")).unwrap();

        let mut written = 0;
        while written < 4 {
            written += transport.write_bytes(&b"ping"[written..]).unwrap();
        }

        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while got.len() < 4 {
            let n = transport.read_bytes(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
            assert!(Instant::now() < deadline, "timed out waiting for echo");
        }
        assert_eq!(got, b"ping");
    }

    #[test]
    fn close_write_produces_eof_downstream() {
        let mut transport = ExecTransport::spawn(Command::new("cat")).unwrap();
        transport.close_write().unwrap();
        assert!(!transport.is_open_for_writing());

        let mut buf = [0u8; 16];
        let deadline = Instant::now() + Duration::from_secs(5);
        while transport.is_open_for_reading() {
            transport.read_bytes(&mut buf).unwrap();
            assert!(Instant::now() < deadline, "timed out waiting for EOF");
        }
        assert!(!transport.is_open());
    }

    #[test]
    fn spawn_failure_reports_command() {
        let err = ExecTransport::spawn(Command::new("cmdmux-no-such-binary")).unwrap_err();
        match err {
            ChannelError::Spawn { command, .. } => {
                assert_eq!(command, "cmdmux-no-such-binary");
            }
            other => panic!("expected Spawn error, got {other:?}"),
        }
    }

    #[test]
    fn exposes_stdio_descriptors() {
        let transport = ExecTransport::spawn(Command::new("cat")).unwrap();
        assert_eq!(transport.read_fds().len(), 1);
        assert_eq!(transport.write_fds().len(), 1);
    }
}
