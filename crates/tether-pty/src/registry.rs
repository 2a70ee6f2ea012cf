use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::pty::{NativePty, PtyBackend};
use crate::session::{PtySession, SurfaceId};
use crate::size::WindowSize;

pub(crate) type SessionMap = RwLock<HashMap<SurfaceId, Arc<PtySession>>>;

/// Maps host surfaces to their live sessions.
///
/// The registry is the only authority on whether a surface is terminal
/// backed: a session is inserted once it is fully spawned and removed by
/// [`PtySession::terminate`]. Entries are never replaced in place.
///
/// Owned by whatever process-level context sets the system up; there is no
/// global instance.
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
    backend: Arc<dyn PtyBackend>,
    config: SessionConfig,
}

impl SessionRegistry {
    /// A registry that spawns shells on real pseudo-terminals.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_backend(config, Arc::new(NativePty))
    }

    pub fn with_backend(config: SessionConfig, backend: Arc<dyn PtyBackend>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            backend,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Spawn a shell for `surface_id` and register it.
    ///
    /// On any error the registry is left exactly as it was.
    pub fn spawn(&self, surface_id: SurfaceId, size: WindowSize) -> Result<Arc<PtySession>> {
        if !size.is_valid() {
            return Err(SessionError::InvalidSize {
                cols: size.cols,
                rows: size.rows,
            });
        }
        if self.contains(surface_id) {
            return Err(SessionError::SurfaceBusy(surface_id));
        }

        let parts = self.backend.open(size, &self.config)?;
        let session = Arc::new(PtySession::new(
            surface_id,
            size,
            parts,
            &self.config,
            Arc::downgrade(&self.sessions),
        ));

        let mut sessions = self.write();
        match sessions.entry(surface_id) {
            Entry::Occupied(_) => {
                // Lost a race with another spawn for the same surface.
                drop(sessions);
                session.terminate();
                return Err(SessionError::SurfaceBusy(surface_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&session));
            }
        }
        drop(sessions);

        log::info!(
            "spawned shell (pid {:?}) for surface {surface_id} at {}x{}",
            session.child_pid(),
            size.cols,
            size.rows
        );
        Ok(session)
    }

    /// The live session for a surface, if any.
    pub fn get(&self, surface_id: SurfaceId) -> Option<Arc<PtySession>> {
        self.read().get(&surface_id).cloned()
    }

    pub fn contains(&self, surface_id: SurfaceId) -> bool {
        self.read().contains_key(&surface_id)
    }

    /// Terminate the session for a surface. Returns whether there was one.
    pub fn terminate(&self, surface_id: SurfaceId) -> bool {
        // Clone out first: terminate takes the write lock itself.
        match self.get(surface_id) {
            Some(session) => {
                session.terminate();
                true
            }
            None => false,
        }
    }

    /// Terminate every registered session.
    pub fn terminate_all(&self) {
        let sessions: Vec<Arc<PtySession>> = self.read().values().cloned().collect();
        for session in sessions {
            session.terminate();
        }
    }

    /// List all surfaces with a live session.
    pub fn surfaces(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<SurfaceId> = self.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SurfaceId, Arc<PtySession>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SurfaceId, Arc<PtySession>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingPty, PipePty};

    fn pipe_registry() -> SessionRegistry {
        SessionRegistry::with_backend(SessionConfig::default(), Arc::new(PipePty::new()))
    }

    #[test]
    fn test_spawn_and_list() {
        let registry = pipe_registry();
        registry.spawn(2, WindowSize::default()).unwrap();
        registry.spawn(1, WindowSize::default()).unwrap();

        assert_eq!(registry.surfaces(), vec![1, 2]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get(1).is_some());
        assert!(registry.get(999).is_none());
    }

    #[test]
    fn test_spawn_then_terminate_leaves_nothing() {
        let registry = pipe_registry();
        for (cols, rows) in [(1, 1), (80, 24), (1, 500), (300, 1)] {
            let session = registry.spawn(5, WindowSize::new(cols, rows)).unwrap();
            session.terminate();
            assert!(!registry.contains(5));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_one_session_per_surface() {
        let registry = pipe_registry();
        let first = registry.spawn(4, WindowSize::default()).unwrap();

        let err = registry.spawn(4, WindowSize::default()).unwrap_err();
        assert!(matches!(err, SessionError::SurfaceBusy(4)));
        assert!(Arc::ptr_eq(&registry.get(4).unwrap(), &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_interleaved_spawn_terminate() {
        let registry = pipe_registry();
        let ops: [(SurfaceId, bool); 10] = [
            (1, true),
            (2, true),
            (1, false),
            (1, true),
            (1, true),
            (2, false),
            (3, true),
            (2, false),
            (2, true),
            (3, false),
        ];
        for (surface, spawn) in ops {
            if spawn {
                let _ = registry.spawn(surface, WindowSize::default());
            } else {
                registry.terminate(surface);
            }
            for id in registry.surfaces() {
                assert!(registry.get(id).unwrap().is_alive());
            }
        }
        assert_eq!(registry.surfaces(), vec![1, 2]);
    }

    #[test]
    fn test_resource_exhausted_leaves_registry_unchanged() {
        let registry =
            SessionRegistry::with_backend(SessionConfig::default(), Arc::new(FailingPty));
        let err = registry.spawn(1, WindowSize::default()).unwrap_err();
        assert!(matches!(err, SessionError::ResourceExhausted(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_size_is_rejected() {
        let registry = pipe_registry();
        let err = registry.spawn(1, WindowSize::new(80, 0)).unwrap_err();
        assert!(matches!(err, SessionError::InvalidSize { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_terminate_unknown_surface() {
        let registry = pipe_registry();
        assert!(!registry.terminate(999));
    }

    #[test]
    fn test_concurrent_spawn_same_surface() {
        let registry = Arc::new(pipe_registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.spawn(9, WindowSize::default()).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_drop_terminates_sessions() {
        let registry = pipe_registry();
        let session = registry.spawn(1, WindowSize::default()).unwrap();
        drop(registry);
        assert!(!session.is_alive());
    }

    #[test]
    fn test_native_spawn_then_terminate() {
        let config = SessionConfig {
            shell: Some("/bin/sh".to_string()),
            ..SessionConfig::default()
        };
        let registry = SessionRegistry::new(config);
        let session = registry.spawn(1, WindowSize::new(80, 24)).unwrap();
        assert!(session.child_pid().is_some());

        registry.terminate(1);
        assert!(!registry.contains(1));
        assert!(session.reap(std::time::Duration::from_secs(3)).is_some());
    }
}
