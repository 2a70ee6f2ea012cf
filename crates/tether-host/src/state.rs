//! State shared between the host's command handlers and the read pumps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tether_pty::{PtyBackend, SessionConfig, SessionRegistry, SurfaceId};

/// Process-wide terminal state, created once by whoever embeds the layer.
pub struct TerminalState {
    /// Every live session, keyed by the surface it renders into.
    pub registry: SessionRegistry,
    /// Text last written to each surface by the render path.
    rendered: Mutex<HashMap<SurfaceId, String>>,
}

impl TerminalState {
    /// State backed by real pseudo-terminals.
    pub fn new(config: SessionConfig) -> Self {
        Self::from_registry(SessionRegistry::new(config))
    }

    pub fn with_backend(config: SessionConfig, backend: Arc<dyn PtyBackend>) -> Self {
        Self::from_registry(SessionRegistry::with_backend(config, backend))
    }

    pub fn from_registry(registry: SessionRegistry) -> Self {
        Self {
            registry,
            rendered: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        self.registry.config()
    }

    /// Record `text` as the surface's rendered content. Returns `false` if
    /// it is what the surface already shows.
    pub(crate) fn update_rendered(&self, surface: SurfaceId, text: &str) -> bool {
        let mut rendered = self.rendered();
        if rendered.get(&surface).is_some_and(|last| last == text) {
            return false;
        }
        rendered.insert(surface, text.to_string());
        true
    }

    /// The surface was edited locally; the next render must rewrite it.
    pub(crate) fn invalidate(&self, surface: SurfaceId) {
        self.rendered().remove(&surface);
    }

    fn rendered(&self) -> MutexGuard<'_, HashMap<SurfaceId, String>> {
        self.rendered.lock().unwrap_or_else(|e| e.into_inner())
    }
}
