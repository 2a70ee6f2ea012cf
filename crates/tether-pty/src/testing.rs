//! In-process PTY backends for driving sessions deterministically.
//!
//! [`PipePty`] replaces the pseudo-terminal with a pipe for output and an
//! in-memory buffer for input, so a test can play the shell: emit output,
//! hang up, and inspect exactly which bytes a session wrote. [`FailingPty`]
//! behaves like a host that has run out of pseudo-terminals.

use std::fs::File;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use nix::fcntl::OFlag;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::pty::{ChildProcess, PtyBackend, PtyControl, PtyParts};
use crate::size::WindowSize;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A backend that never has a pseudo-terminal to give.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingPty;

impl PtyBackend for FailingPty {
    fn open(&self, _size: WindowSize, _config: &SessionConfig) -> Result<PtyParts> {
        Err(SessionError::ResourceExhausted("out of PTYs".to_string()))
    }
}

/// The test's end of one pipe-backed PTY.
#[derive(Clone)]
pub struct PipeHandle {
    output: Arc<Mutex<Option<File>>>,
    input: Arc<Mutex<Vec<u8>>>,
    input_broken: Arc<AtomicBool>,
    sizes: Arc<Mutex<Vec<WindowSize>>>,
    exit_code: Arc<Mutex<Option<u32>>>,
}

impl PipeHandle {
    /// Write bytes as if the shell had printed them.
    pub fn emit(&self, bytes: &[u8]) -> io::Result<()> {
        match lock(&self.output).as_mut() {
            Some(file) => file.write_all(bytes),
            None => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }

    /// Close the shell's side: the reader sees end-of-stream.
    pub fn hang_up(&self) {
        lock(&self.output).take();
    }

    /// Record an exit code for the fake child.
    pub fn exit(&self, code: u32) {
        *lock(&self.exit_code) = Some(code);
        self.hang_up();
    }

    /// Every byte the session has written so far.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.input).clone()
    }

    /// Make all further writes fail as on a dead descriptor.
    pub fn break_input(&self) {
        self.input_broken.store(true, Ordering::Release);
    }

    /// Sizes passed to resize, oldest first.
    pub fn sizes(&self) -> Vec<WindowSize> {
        lock(&self.sizes).clone()
    }
}

/// Pipe-backed stand-in for [`crate::NativePty`].
#[derive(Default)]
pub struct PipePty {
    opened: Mutex<Vec<PipeHandle>>,
}

impl PipePty {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the most recently opened PTY.
    pub fn last(&self) -> Option<PipeHandle> {
        lock(&self.opened).last().cloned()
    }

    /// Number of PTYs opened so far.
    pub fn opened(&self) -> usize {
        lock(&self.opened).len()
    }
}

impl PtyBackend for PipePty {
    fn open(&self, _size: WindowSize, _config: &SessionConfig) -> Result<PtyParts> {
        // Close-on-exec so shells spawned by concurrent tests cannot hold
        // the write end open.
        let (read_end, write_end) =
            nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(io::Error::from)?;

        let handle = PipeHandle {
            output: Arc::new(Mutex::new(Some(File::from(write_end)))),
            input: Arc::new(Mutex::new(Vec::new())),
            input_broken: Arc::new(AtomicBool::new(false)),
            sizes: Arc::new(Mutex::new(Vec::new())),
            exit_code: Arc::new(Mutex::new(None)),
        };
        lock(&self.opened).push(handle.clone());

        Ok(PtyParts {
            control: Box::new(RecordingControl {
                sizes: Arc::clone(&handle.sizes),
            }),
            writer: Box::new(RecordingWriter {
                input: Arc::clone(&handle.input),
                broken: Arc::clone(&handle.input_broken),
            }),
            reader: read_end,
            child: Box::new(FakeChild {
                exit_code: Arc::clone(&handle.exit_code),
            }),
        })
    }
}

struct RecordingControl {
    sizes: Arc<Mutex<Vec<WindowSize>>>,
}

impl PtyControl for RecordingControl {
    fn resize(&self, size: WindowSize) -> Result<()> {
        lock(&self.sizes).push(size);
        Ok(())
    }
}

struct RecordingWriter {
    input: Arc<Mutex<Vec<u8>>>,
    broken: Arc<AtomicBool>,
}

impl Write for RecordingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken.load(Ordering::Acquire) {
            return Err(io::Error::from_raw_os_error(nix::libc::EIO));
        }
        lock(&self.input).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A child with no OS process behind it, so nothing is ever signalled.
struct FakeChild {
    exit_code: Arc<Mutex<Option<u32>>>,
}

impl ChildProcess for FakeChild {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn try_wait(&mut self) -> Option<u32> {
        *lock(&self.exit_code)
    }

    // No process, so nothing to block on.
    fn wait(&mut self) -> Option<u32> {
        self.try_wait()
    }
}
