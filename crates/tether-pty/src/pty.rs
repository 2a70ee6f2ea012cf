//! Pseudo-terminal allocation and shell spawning.
//!
//! [`PtyBackend`] is the seam between a session and the OS: it hands back the
//! pieces a session owns (window-size control, writer, child) and the
//! descriptor the read pump drains. [`NativePty`] is the real implementation.

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::sys::termios::{
    self, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::size::WindowSize;

/// Window-size control of a PTY master.
pub trait PtyControl: Send {
    fn resize(&self, size: WindowSize) -> Result<()>;
}

/// The shell process on the other side of a PTY.
pub trait ChildProcess: Send {
    /// OS process id, if the backend runs a real process.
    fn pid(&self) -> Option<u32>;

    /// Exit code if the process has exited. Never blocks.
    fn try_wait(&mut self) -> Option<u32>;

    /// Block until the process exits and return its exit code.
    fn wait(&mut self) -> Option<u32>;
}

/// Everything a freshly spawned PTY hands to its session.
pub struct PtyParts {
    pub control: Box<dyn PtyControl>,
    pub writer: Box<dyn Write + Send>,
    /// Readable side of the master, owned by whoever drains the output.
    pub reader: OwnedFd,
    pub child: Box<dyn ChildProcess>,
}

/// Allocates a PTY pair and starts the configured shell on it.
pub trait PtyBackend: Send + Sync {
    /// Fails with [`SessionError::ResourceExhausted`] when no PTY pair is
    /// available and [`SessionError::ProcessSpawnFailed`] when the shell
    /// cannot be exec'd. Nothing is left running on failure.
    fn open(&self, size: WindowSize, config: &SessionConfig) -> Result<PtyParts>;
}

/// OS pseudo-terminals via `portable-pty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePty;

impl PtyBackend for NativePty {
    fn open(&self, size: WindowSize, config: &SessionConfig) -> Result<PtyParts> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(size.into())
            .map_err(|e| SessionError::ResourceExhausted(format!("failed to open PTY: {e}")))?;

        let reader = dup_master_fd(pair.master.as_ref())?;

        configure_line_discipline(reader.as_fd(), config.erase_char)?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::ResourceExhausted(format!("failed to take writer: {e}")))?;

        let shell = config.resolved_shell();
        let mut cmd = CommandBuilder::new(&shell);
        cmd.args(&config.args);
        cmd.env("TERM", &config.term);
        if let Some(dir) = &config.working_dir {
            cmd.cwd(dir);
        }

        // Exec failures come back through the spawn call itself.
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::ProcessSpawnFailed(format!("{shell}: {e}")))?;

        // The child holds its own slave descriptors; ours would keep the
        // master from ever seeing a hang-up.
        drop(pair.slave);

        Ok(PtyParts {
            control: Box::new(NativeControl {
                master: pair.master,
            }),
            writer,
            reader,
            child: Box::new(NativeChild { child }),
        })
    }
}

struct NativeControl {
    master: Box<dyn MasterPty + Send>,
}

impl PtyControl for NativeControl {
    fn resize(&self, size: WindowSize) -> Result<()> {
        self.master
            .resize(size.into())
            .map_err(|e| SessionError::ResizeFailed(e.to_string()))
    }
}

struct NativeChild {
    child: Box<dyn Child + Send + Sync>,
}

impl ChildProcess for NativeChild {
    fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn try_wait(&mut self) -> Option<u32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code()),
            _ => None,
        }
    }

    fn wait(&mut self) -> Option<u32> {
        self.child.wait().ok().map(|status| status.exit_code())
    }
}

/// A descriptor of its own for the master, independent of `master`'s
/// lifetime.
fn dup_master_fd(master: &dyn MasterPty) -> Result<OwnedFd> {
    let raw = master.as_raw_fd().ok_or_else(|| {
        SessionError::ResourceExhausted("PTY master has no file descriptor".to_string())
    })?;
    // SAFETY: `master` owns `raw` and is borrowed for the whole call.
    let borrowed = unsafe { BorrowedFd::borrow_raw(raw) };
    Ok(borrowed.try_clone_to_owned()?)
}

/// Put the line discipline into canonical interactive mode: line editing
/// with `erase` as VERASE, echo, signal keys, CR→NL on input and NL→CRNL on
/// output.
pub fn configure_line_discipline(fd: BorrowedFd<'_>, erase: u8) -> Result<()> {
    let mut attrs = termios::tcgetattr(fd).map_err(io::Error::from)?;

    attrs.input_flags |= InputFlags::ICRNL;
    attrs.input_flags &= !(InputFlags::INLCR | InputFlags::IGNCR);
    attrs.output_flags |= OutputFlags::OPOST | OutputFlags::ONLCR;
    attrs.local_flags |= LocalFlags::ICANON
        | LocalFlags::ECHO
        | LocalFlags::ECHOE
        | LocalFlags::ECHOK
        | LocalFlags::ISIG
        | LocalFlags::IEXTEN;
    attrs.control_chars[SpecialCharacterIndices::VERASE as usize] = erase;

    termios::tcsetattr(fd, SetArg::TCSANOW, &attrs).map_err(io::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::fd::AsRawFd;
    use std::time::{Duration, Instant};

    fn kill_child(child: &dyn ChildProcess) {
        if let Some(pid) = child.pid() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGKILL,
            );
        }
    }

    fn sh_config() -> SessionConfig {
        SessionConfig {
            shell: Some("/bin/sh".to_string()),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_open_native_pty() {
        let mut parts = NativePty.open(WindowSize::default(), &sh_config()).unwrap();
        assert!(parts.child.pid().is_some());
        assert!(parts.child.try_wait().is_none());

        kill_child(parts.child.as_ref());
    }

    #[test]
    fn test_line_discipline_is_canonical() {
        // A shell with line editing would switch the terminal to raw mode.
        let config = SessionConfig {
            shell: Some("/bin/sleep".to_string()),
            args: vec!["5".to_string()],
            ..SessionConfig::default()
        };
        let parts = NativePty.open(WindowSize::default(), &config).unwrap();
        let attrs = termios::tcgetattr(parts.reader.as_fd()).unwrap();

        assert!(attrs.local_flags.contains(LocalFlags::ECHO));
        assert!(attrs.output_flags.contains(OutputFlags::ONLCR));
        assert_eq!(
            attrs.control_chars[SpecialCharacterIndices::VERASE as usize],
            crate::config::BACKSPACE
        );

        kill_child(parts.child.as_ref());
    }

    #[test]
    fn test_missing_shell_fails_to_spawn() {
        let config = SessionConfig {
            shell: Some("/nonexistent/shell".to_string()),
            ..SessionConfig::default()
        };
        let err = NativePty.open(WindowSize::default(), &config).err().unwrap();
        assert!(matches!(err, SessionError::ProcessSpawnFailed(_)), "got {err:?}");
    }

    #[test]
    fn test_write_read_echo() {
        let mut parts = NativePty.open(WindowSize::default(), &sh_config()).unwrap();
        parts.writer.write_all(b"echo TETHER_TEST_OK\n").unwrap();
        parts.writer.flush().unwrap();

        let mut reader = std::fs::File::from(parts.reader);
        let mut output = Vec::new();
        let mut buf = [0u8; 4096];
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    output.extend_from_slice(&buf[..n]);
                    if String::from_utf8_lossy(&output).contains("TETHER_TEST_OK\r\n") {
                        break;
                    }
                }
            }
        }

        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("TETHER_TEST_OK"), "got: {text}");

        kill_child(parts.child.as_ref());
    }

    #[test]
    fn test_dup_master_fd_is_independent() {
        let pair = native_pty_system().openpty(WindowSize::default().into()).unwrap();
        let dup = dup_master_fd(pair.master.as_ref()).unwrap();
        assert_ne!(Some(dup.as_raw_fd()), pair.master.as_raw_fd());

        drop(pair);
        // Still a terminal after the original master is closed.
        assert!(termios::tcgetattr(dup.as_fd()).is_ok());
    }

    #[test]
    fn test_resize() {
        let parts = NativePty.open(WindowSize::default(), &sh_config()).unwrap();
        assert!(parts.control.resize(WindowSize::new(120, 40)).is_ok());

        kill_child(parts.child.as_ref());
    }
}
