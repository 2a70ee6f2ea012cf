//! Error types for session operations

use std::io;

use thiserror::Error;

use crate::session::SurfaceId;

/// Session error type
#[derive(Error, Debug)]
pub enum SessionError {
    /// No pseudo-terminal pair could be allocated
    #[error("no pseudo-terminal available: {0}")]
    ResourceExhausted(String),

    /// The shell could not be started
    #[error("failed to spawn shell: {0}")]
    ProcessSpawnFailed(String),

    /// The session was already torn down
    #[error("session for surface {0} is closed")]
    SessionClosed(SurfaceId),

    /// Read or write failure on the PTY descriptor
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("PTY resize failed: {0}")]
    ResizeFailed(String),

    /// The surface already has a live session
    #[error("surface {0} already has a live session")]
    SurfaceBusy(SurfaceId),

    #[error("invalid terminal size {cols}x{rows}")]
    InvalidSize { cols: u16, rows: u16 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
