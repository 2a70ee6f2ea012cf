//! Commands the host invokes to manage terminal surfaces.
//!
//! These handle creating, refreshing, resizing and closing terminal
//! surfaces. They run on the host's own thread.

use std::sync::Arc;

use tether_pty::{PtySession, Result, SessionError, SurfaceId, WindowSize};

use crate::host::Host;
use crate::input::InputRouter;
use crate::read_pump::{start_read_pump, PumpSettings};
use crate::render::render_session;
use crate::state::TerminalState;

pub struct TerminalCommands {
    host: Arc<dyn Host>,
    state: Arc<TerminalState>,
}

impl TerminalCommands {
    pub fn new(host: Arc<dyn Host>, state: Arc<TerminalState>) -> Self {
        Self { host, state }
    }

    pub fn state(&self) -> &Arc<TerminalState> {
        &self.state
    }

    /// A router feeding edits on this host's surfaces to their shells.
    pub fn input_router(&self) -> InputRouter {
        InputRouter::new(Arc::clone(&self.host), Arc::clone(&self.state))
    }

    /// Create a surface and run a shell in it.
    ///
    /// On failure the new surface is closed again and nothing is registered.
    pub fn new_terminal(&self) -> Result<SurfaceId> {
        let surface = self.host.create_surface();
        match self.open_terminal(surface) {
            Ok(_) => Ok(surface),
            Err(e) => {
                log::warn!("could not start a shell for surface {surface}: {e}");
                self.host.close_surface(surface);
                Err(e)
            }
        }
    }

    /// Run a shell in an existing surface sized to its viewport.
    ///
    /// Leaves the surface alone on failure.
    pub fn open_terminal(&self, surface: SurfaceId) -> Result<Arc<PtySession>> {
        let size = self
            .host
            .viewport(surface)
            .map(|viewport| viewport.cells())
            .unwrap_or_default();

        let session = self.state.registry.spawn(surface, size)?;
        self.state.invalidate(surface);

        let Some(reader) = session.take_reader() else {
            session.terminate();
            return Err(SessionError::SessionClosed(surface));
        };
        let settings = PumpSettings::from(self.state.config());
        if let Err(e) = start_read_pump(
            Arc::clone(&self.host),
            Arc::clone(&session),
            reader,
            settings,
        ) {
            session.terminate();
            return Err(e.into());
        }

        log::debug!("surface {surface}: read pump started");
        Ok(session)
    }

    /// Render the surface's session into it. Returns `false` if the surface
    /// has no session or is gone.
    pub fn refresh_surface(&self, surface: SurfaceId) -> bool {
        let Some(session) = self.state.registry.get(surface) else {
            self.state.invalidate(surface);
            return false;
        };
        render_session(self.host.as_ref(), &self.state, &session)
    }

    /// Resize the surface's session to its current viewport.
    ///
    /// Returns whether the size changed.
    pub fn viewport_changed(&self, surface: SurfaceId) -> Result<bool> {
        let Some(session) = self.state.registry.get(surface) else {
            return Ok(false);
        };
        let Some(viewport) = self.host.viewport(surface) else {
            return Ok(false);
        };

        let size: WindowSize = viewport.cells();
        if size == session.size() {
            return Ok(false);
        }
        session.resize(size)?;
        self.state.invalidate(surface);
        Ok(true)
    }

    /// Terminate the surface's session. The surface itself stays.
    pub fn close_terminal(&self, surface: SurfaceId) -> bool {
        self.state.invalidate(surface);
        self.state.registry.terminate(surface)
    }
}
