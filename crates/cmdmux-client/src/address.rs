use std::path::{Path, PathBuf};

use crate::error::{ClientError, Result};

/// Directory under the workspace root that holds proxy runtime state.
pub const SOCKET_DIR: &str = ".cmdmux";

/// Socket file name within [`SOCKET_DIR`].
pub const SOCKET_FILE: &str = "daemon.sock";

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Derive the proxy endpoint address for a workspace.
///
/// The workspace path is canonicalized first, so every party referring
/// to the same workspace — through symlinks, relative paths, or `..`
/// segments — computes the same address and rendezvouses on the same
/// proxy.
pub fn socket_path(workspace: impl AsRef<Path>) -> Result<PathBuf> {
    let workspace = workspace.as_ref();
    let canonical = workspace
        .canonicalize()
        .map_err(|e| ClientError::Workspace {
            path: workspace.to_path_buf(),
            source: e,
        })?;

    let path = canonical.join(SOCKET_DIR).join(SOCKET_FILE);
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(ClientError::PathTooLong {
            path,
            len,
            max: MAX_PATH_LEN,
        });
    }

    Ok(path)
}
