//! Client sessions for a persistent local command-proxy daemon.
//!
//! A [`Session`] binds a workspace to one lazily-established, reused
//! connection to the proxy that owns a long-lived worker process for
//! that workspace. Running a command through the session skips the
//! startup cost of spawning a fresh worker per command:
//!
//! ```no_run
//! use cmdmux_client::Session;
//!
//! let mut session = Session::new("/path/to/workspace");
//! let result = session.execute_command(&["log", "-l", "5"])?;
//! println!("exited {}", result.status);
//! # Ok::<(), cmdmux_client::ClientError>(())
//! ```
//!
//! The proxy's address is a pure function of the workspace path, so
//! independent clients of the same workspace rendezvous on one shared
//! worker; the proxy serializes their commands onto it.

pub mod address;
pub mod error;
pub mod session;

pub use address::socket_path;
pub use error::{ClientError, Result};
pub use session::{CommandResult, Session};
