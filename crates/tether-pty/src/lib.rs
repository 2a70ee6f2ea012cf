//! tether-pty: PTY sessions and the registry that owns them.
//!
//! This crate sits between the pseudo-terminal (a real shell process) and the
//! screen model. The read pump and render path live with the host adapter.
//!
//! # Architecture
//!
//! - [`PtyBackend`]: allocates a PTY pair and spawns the shell ([`NativePty`]).
//! - [`PtySession`]: one shell bound to one host surface: input, resize,
//!   output feeding and idempotent teardown.
//! - [`SessionRegistry`]: surface id to live session; the single source of
//!   truth for whether a surface is terminal backed.

pub mod config;
pub mod error;
pub mod pty;
pub mod registry;
pub mod session;
pub mod size;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use pty::{ChildProcess, NativePty, PtyBackend, PtyControl, PtyParts};
pub use registry::SessionRegistry;
pub use session::{PtySession, SurfaceId};
pub use size::WindowSize;
