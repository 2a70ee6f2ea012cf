//! Session configuration, loadable from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_vt::VtOptions;

use crate::error::{Result, SessionError};

/// ASCII backspace, the default erase character.
pub const BACKSPACE: u8 = 0x08;

/// Everything a session needs to know besides its surface and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Shell to exec. Falls back to `$SHELL`, then `/bin/sh`.
    pub shell: Option<String>,
    /// Arguments passed to the shell.
    pub args: Vec<String>,
    /// Value of `TERM` in the shell's environment.
    pub term: String,
    /// Working directory of the shell. Inherited when unset.
    pub working_dir: Option<PathBuf>,
    /// How long the read pump waits for output before re-checking whether
    /// its session is still alive.
    pub poll_interval_ms: u64,
    /// Maximum bytes taken from the PTY per read.
    pub read_chunk_size: usize,
    /// Consecutive write attempts without progress before giving up.
    pub write_retry_limit: u32,
    /// Byte sent for a backward deletion and installed as the PTY's VERASE.
    pub erase_char: u8,
    /// Lines of scrollback kept by the screen model.
    pub scrollback: usize,
    /// Treat a bare line feed from the shell as CR+LF.
    pub newline_mode: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: None,
            args: Vec::new(),
            term: "xterm-256color".to_string(),
            working_dir: None,
            poll_interval_ms: 250,
            read_chunk_size: 4096,
            write_retry_limit: 64,
            erase_char: BACKSPACE,
            scrollback: 10_000,
            newline_mode: true,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.term.is_empty() {
            return Err(SessionError::Config("term must not be empty".into()));
        }
        if self.read_chunk_size == 0 {
            return Err(SessionError::Config("read_chunk_size must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(SessionError::Config("poll_interval_ms must be positive".into()));
        }
        if self.write_retry_limit == 0 {
            return Err(SessionError::Config("write_retry_limit must be positive".into()));
        }
        Ok(())
    }

    /// The shell program that will be exec'd.
    pub fn resolved_shell(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "/bin/sh".to_string())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn vt_options(&self) -> VtOptions {
        VtOptions {
            scrollback: self.scrollback,
            newline_mode: self.newline_mode,
        }
    }
}
