//! Per-session pump that drains PTY output into the screen model.
//!
//! Each session gets its own task because PTY reads block. The pump owns the
//! read side of the master directly (not behind any session lock), so a
//! pending read never holds up input or rendering. It polls with a timeout
//! so it notices a session terminated from elsewhere.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsFd, OwnedFd};
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tether_pty::{PtySession, SessionConfig};

use crate::host::Host;

/// How long a finished pump polls for the shell's exit before blocking on
/// it.
const REAP_GRACE: Duration = Duration::from_millis(500);

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpExit {
    /// The shell side hung up.
    EndOfStream,
    /// The host no longer has the surface.
    SurfaceClosed,
    /// The session was terminated by someone else.
    SessionTerminated,
    ReadError(io::Error),
}

/// Read pump tuning taken from the session config.
#[derive(Debug, Clone, Copy)]
pub struct PumpSettings {
    pub poll_interval: Duration,
    pub chunk_size: usize,
}

impl From<&SessionConfig> for PumpSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            chunk_size: config.read_chunk_size.max(1),
        }
    }
}

/// Start the read pump for `session` as a host task.
///
/// `reader` is the descriptor taken from the session with
/// [`PtySession::take_reader`].
pub fn start_read_pump(
    host: Arc<dyn Host>,
    session: Arc<PtySession>,
    reader: OwnedFd,
    settings: PumpSettings,
) -> io::Result<()> {
    let name = format!("pty-read-{}", session.surface_id());
    let spawner = Arc::clone(&host);
    spawner.spawn_task(
        name,
        Box::new(move || {
            run_read_pump(host.as_ref(), &session, reader, settings);
        }),
    )
}

/// Pump until the stream ends, then tear the session down.
pub fn run_read_pump(
    host: &dyn Host,
    session: &PtySession,
    reader: OwnedFd,
    settings: PumpSettings,
) -> PumpExit {
    let surface = session.surface_id();
    let exit = pump(host, session, reader, settings);

    match &exit {
        PumpExit::EndOfStream => log::debug!("surface {surface}: shell hung up"),
        PumpExit::SurfaceClosed => log::debug!("surface {surface}: surface closed"),
        PumpExit::SessionTerminated => log::debug!("surface {surface}: session terminated"),
        PumpExit::ReadError(e) => log::warn!("surface {surface}: PTY read failed: {e}"),
    }

    session.terminate();
    let status = session.reap(REAP_GRACE).or_else(|| {
        log::debug!("surface {surface}: shell still running after hang-up, waiting");
        session.wait()
    });
    match status {
        Some(code) => log::info!("surface {surface}: shell exited with status {code}"),
        None => log::debug!("surface {surface}: shell exit status not collected"),
    }
    exit
}

fn pump(
    host: &dyn Host,
    session: &PtySession,
    reader: OwnedFd,
    settings: PumpSettings,
) -> PumpExit {
    let surface = session.surface_id();
    let mut reader = File::from(reader);
    let mut buf = vec![0u8; settings.chunk_size];
    let timeout = poll_timeout(settings.poll_interval);

    loop {
        if !session.is_alive() {
            return PumpExit::SessionTerminated;
        }

        match wait_readable(&reader, timeout) {
            Ok(true) => {}
            Ok(false) => {
                // An idle shell produces no redraw requests to fail on.
                if !host.surface_exists(surface) {
                    return PumpExit::SurfaceClosed;
                }
                continue;
            }
            Err(e) => return PumpExit::ReadError(e),
        }

        let n = match reader.read(&mut buf) {
            Ok(0) => return PumpExit::EndOfStream,
            Ok(n) => n,
            Err(e) if is_transient(&e) => continue,
            // Linux reports a hung-up PTY master as EIO.
            Err(e) if e.raw_os_error() == Some(libc::EIO) => return PumpExit::EndOfStream,
            Err(e) => return PumpExit::ReadError(e),
        };

        for reply in session.feed_output(&buf[..n]) {
            if let Err(e) = session.write_input(reply.as_bytes()) {
                log::debug!("surface {surface}: dropped terminal reply: {e}");
            }
        }

        if !host.request_redraw(surface) {
            return PumpExit::SurfaceClosed;
        }
    }
}

/// Wait for the descriptor to become readable. Hang-ups count as readable
/// so the following read reports them.
fn wait_readable(reader: &File, timeout: PollTimeout) -> io::Result<bool> {
    let mut fds = [PollFd::new(reader.as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, timeout) {
        Ok(0) | Err(Errno::EINTR) => Ok(false),
        Ok(_) => Ok(true),
        Err(e) => Err(e.into()),
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

fn poll_timeout(interval: Duration) -> PollTimeout {
    let millis = u16::try_from(interval.as_millis()).unwrap_or(u16::MAX);
    PollTimeout::from(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_timeout_clamps() {
        assert_eq!(poll_timeout(Duration::from_millis(250)), PollTimeout::from(250u16));
        assert_eq!(poll_timeout(Duration::from_secs(3600)), PollTimeout::from(u16::MAX));
    }

    #[test]
    fn test_settings_from_config() {
        let config = SessionConfig {
            poll_interval_ms: 40,
            read_chunk_size: 16,
            ..SessionConfig::default()
        };
        let settings = PumpSettings::from(&config);
        assert_eq!(settings.poll_interval, Duration::from_millis(40));
        assert_eq!(settings.chunk_size, 16);
    }

    #[test]
    fn test_wait_readable_times_out_then_sees_data() {
        use std::io::Write;

        let (read_end, write_end) = nix::unistd::pipe().unwrap();
        let reader = File::from(read_end);
        let mut writer = File::from(write_end);

        assert!(!wait_readable(&reader, PollTimeout::from(10u16)).unwrap());
        writer.write_all(b"x").unwrap();
        assert!(wait_readable(&reader, PollTimeout::from(10u16)).unwrap());

        drop(writer);
        let mut buf = [0u8; 4];
        assert_eq!((&reader).read(&mut buf).unwrap(), 1);
        assert!(wait_readable(&reader, PollTimeout::from(10u16)).unwrap());
    }
}
