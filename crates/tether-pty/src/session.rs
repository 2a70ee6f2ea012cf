use std::fmt;
use std::io::{self, Write};
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tether_vt::{ScreenSnapshot, VtTerminal};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::pty::{ChildProcess, PtyControl, PtyParts};
use crate::registry::SessionMap;
use crate::size::WindowSize;

/// Opaque identifier of the host surface a session renders into.
pub type SurfaceId = u64;

/// The parts of the PTY that die with the session.
struct PtyIo {
    control: Box<dyn PtyControl>,
    writer: Box<dyn Write + Send>,
}

/// One live shell attached to one host surface.
///
/// The screen model sits behind its own mutex: the read pump is its only
/// writer and the render path its only reader. Everything that touches the
/// descriptor goes through `io`, which is emptied exactly once by
/// [`PtySession::terminate`].
pub struct PtySession {
    surface_id: SurfaceId,
    child_pid: Option<u32>,
    io: Mutex<Option<PtyIo>>,
    reader: Mutex<Option<OwnedFd>>,
    child: Mutex<Box<dyn ChildProcess>>,
    screen: Mutex<VtTerminal>,
    size: Mutex<WindowSize>,
    terminated: AtomicBool,
    write_retry_limit: u32,
    registry: Weak<SessionMap>,
}

impl PtySession {
    pub(crate) fn new(
        surface_id: SurfaceId,
        size: WindowSize,
        parts: PtyParts,
        config: &SessionConfig,
        registry: Weak<SessionMap>,
    ) -> Self {
        let PtyParts {
            control,
            writer,
            reader,
            child,
        } = parts;

        Self {
            surface_id,
            child_pid: child.pid(),
            io: Mutex::new(Some(PtyIo { control, writer })),
            reader: Mutex::new(Some(reader)),
            child: Mutex::new(child),
            screen: Mutex::new(VtTerminal::with_options(
                size.cols,
                size.rows,
                config.vt_options(),
            )),
            size: Mutex::new(size),
            terminated: AtomicBool::new(false),
            write_retry_limit: config.write_retry_limit,
            registry,
        }
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }

    pub fn size(&self) -> WindowSize {
        *lock(&self.size)
    }

    /// `false` once [`PtySession::terminate`] has run.
    pub fn is_alive(&self) -> bool {
        !self.terminated.load(Ordering::Acquire)
    }

    /// Hand the readable side of the master to the read pump.
    ///
    /// Returns `None` if it was already taken or the session is gone.
    pub fn take_reader(&self) -> Option<OwnedFd> {
        if !self.is_alive() {
            return None;
        }
        lock(&self.reader).take()
    }

    /// Feed shell output into the screen model.
    ///
    /// Returns the replies the model owes the shell (device status and cursor
    /// position reports), which the caller writes back with
    /// [`PtySession::write_input`].
    pub fn feed_output(&self, bytes: &[u8]) -> Vec<String> {
        let mut screen = lock(&self.screen);
        screen.write(bytes);
        screen.take_pty_writes()
    }

    /// Write raw bytes to the shell.
    ///
    /// Short writes are retried until everything is flushed. A descriptor
    /// error is returned once and tears the session down.
    pub fn write_input(&self, data: &[u8]) -> Result<()> {
        let result = {
            let mut io = lock(&self.io);
            let io = io
                .as_mut()
                .ok_or(SessionError::SessionClosed(self.surface_id))?;
            write_fully(&mut io.writer, data, self.write_retry_limit)
        };

        if let Err(err) = result {
            log::warn!("write to surface {} failed: {err}", self.surface_id);
            self.terminate();
            return Err(err.into());
        }
        Ok(())
    }

    /// Change the PTY window size and the screen model's grid.
    pub fn resize(&self, size: WindowSize) -> Result<()> {
        if !size.is_valid() {
            return Err(SessionError::InvalidSize {
                cols: size.cols,
                rows: size.rows,
            });
        }

        let io = lock(&self.io);
        let io = io
            .as_ref()
            .ok_or(SessionError::SessionClosed(self.surface_id))?;

        let mut current = lock(&self.size);
        if *current == size {
            return Ok(());
        }

        io.control.resize(size)?;
        lock(&self.screen).resize(size.cols, size.rows);
        log::debug!(
            "surface {} resized {}x{} -> {}x{}",
            self.surface_id,
            current.cols,
            current.rows,
            size.cols,
            size.rows
        );
        *current = size;
        Ok(())
    }

    /// Unregister the session, hang up the shell and close the descriptor.
    ///
    /// Safe to call any number of times from any thread; only the first call
    /// does anything.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(sessions) = self.registry.upgrade() {
            let mut sessions = sessions.write().unwrap_or_else(|e| e.into_inner());
            let registered_here = sessions
                .get(&self.surface_id)
                .is_some_and(|s| std::ptr::eq(Arc::as_ptr(s), self));
            if registered_here {
                sessions.remove(&self.surface_id);
            }
        }

        self.hang_up();
        drop(lock(&self.io).take());
        drop(lock(&self.reader).take());

        log::info!(
            "terminated session for surface {} (pid {:?})",
            self.surface_id,
            self.child_pid
        );
    }

    /// Exit code of the shell, if it has exited.
    pub fn exit_status(&self) -> Option<u32> {
        lock(&self.child).try_wait()
    }

    /// Poll for the shell's exit status for up to `timeout`.
    pub fn reap(&self, timeout: Duration) -> Option<u32> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(code) = self.exit_status() {
                return Some(code);
            }
            if std::time::Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Block until the shell exits and collect its status, so it is not
    /// left behind as a zombie.
    ///
    /// Call only after [`PtySession::terminate`] and off the host's thread:
    /// a shell that ignores SIGHUP keeps this waiting.
    pub fn wait(&self) -> Option<u32> {
        lock(&self.child).wait()
    }

    /// Run `f` against the screen model while holding its lock.
    pub fn with_screen<R>(&self, f: impl FnOnce(&VtTerminal) -> R) -> R {
        f(&lock(&self.screen))
    }

    /// Current screen as plain-text lines plus cursor.
    pub fn snapshot(&self) -> ScreenSnapshot {
        self.with_screen(VtTerminal::snapshot)
    }

    /// Window title set by the shell, if any.
    pub fn title(&self) -> Option<String> {
        self.with_screen(VtTerminal::title_owned)
    }

    fn hang_up(&self) {
        let Some(pid) = self.child_pid else {
            return;
        };
        match kill(Pid::from_raw(pid as i32), Signal::SIGHUP) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => log::warn!("failed to send SIGHUP to pid {pid}: {e}"),
        }
    }
}

impl fmt::Debug for PtySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtySession")
            .field("surface_id", &self.surface_id)
            .field("child_pid", &self.child_pid)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if !*self.terminated.get_mut() {
            self.hang_up();
        }
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Write all of `data`, retrying short and would-block writes.
///
/// Gives up after `retry_limit` consecutive attempts that made no progress.
pub(crate) fn write_fully(writer: &mut dyn Write, data: &[u8], retry_limit: u32) -> io::Result<()> {
    let mut written = 0;
    let mut stalled = 0;

    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "PTY accepted no bytes",
                ))
            }
            Ok(n) => {
                written += n;
                stalled = 0;
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                stalled += 1;
                if stalled >= retry_limit {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("PTY stopped accepting input after {written} bytes"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }

    writer.flush()
}
