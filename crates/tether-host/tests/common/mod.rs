#![allow(dead_code)]

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tether_host::{HostEvent, InputRouter, MemoryHost, TerminalCommands, TerminalState, Viewport};
use tether_pty::{PtyBackend, SessionConfig};

pub struct Harness {
    pub host: Arc<MemoryHost>,
    pub events: Receiver<HostEvent>,
    pub state: Arc<TerminalState>,
    pub commands: TerminalCommands,
    pub router: InputRouter,
}

impl Harness {
    pub fn new(config: SessionConfig, backend: Arc<dyn PtyBackend>) -> Self {
        let (host, events) = MemoryHost::new(Viewport::from_cells(80, 24));
        let host = Arc::new(host);
        let state = Arc::new(TerminalState::with_backend(config, backend));
        let commands = TerminalCommands::new(host.clone(), Arc::clone(&state));
        let router = commands.input_router();
        Self {
            host,
            events,
            state,
            commands,
            router,
        }
    }

    /// Dispatch host events until `done` holds or `timeout` passes.
    pub fn drive_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            if let Ok(event) = self.events.recv_timeout(Duration::from_millis(10)) {
                event.dispatch(&self.commands, &self.router);
            }
        }
        done()
    }
}

pub fn fast_config() -> SessionConfig {
    SessionConfig {
        poll_interval_ms: 20,
        ..SessionConfig::default()
    }
}
