//! A host that keeps its surfaces in memory.
//!
//! Redraw requests and edits are queued as [`HostEvent`]s for a single
//! driver thread to hand to [`TerminalCommands`] and the [`InputRouter`],
//! the way an editor's main loop would. Used by the `tether` binary and by
//! tests.

use std::collections::HashMap;
use std::io;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

use tether_pty::SurfaceId;

use crate::commands::TerminalCommands;
use crate::host::{EditEvent, Host, Viewport};
use crate::input::InputRouter;

/// Work queued for the driver thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Redraw(SurfaceId),
    Edit(SurfaceId, EditEvent),
}

impl HostEvent {
    /// Run the command this event stands for.
    pub fn dispatch(self, commands: &TerminalCommands, router: &InputRouter) {
        match self {
            HostEvent::Redraw(surface) => {
                commands.refresh_surface(surface);
            }
            HostEvent::Edit(surface, edit) => {
                if let Err(e) = router.on_edit(surface, &edit) {
                    log::warn!("surface {surface}: input dropped: {e}");
                }
            }
        }
    }
}

#[derive(Debug)]
struct Surface {
    text: String,
    cursor: usize,
    viewport: Viewport,
}

pub struct MemoryHost {
    surfaces: Mutex<HashMap<SurfaceId, Surface>>,
    next_id: AtomicU64,
    default_viewport: Viewport,
    events: Mutex<Sender<HostEvent>>,
}

impl MemoryHost {
    /// New surfaces get `viewport`. Events arrive on the returned receiver.
    pub fn new(viewport: Viewport) -> (Self, Receiver<HostEvent>) {
        let (tx, rx) = mpsc::channel();
        let host = Self {
            surfaces: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            default_viewport: viewport,
            events: Mutex::new(tx),
        };
        (host, rx)
    }

    /// Queue an event as if the host had produced it.
    pub fn post(&self, event: HostEvent) -> bool {
        lock(&self.events).send(event).is_ok()
    }

    pub fn text(&self, surface: SurfaceId) -> Option<String> {
        self.surfaces().get(&surface).map(|s| s.text.clone())
    }

    pub fn cursor(&self, surface: SurfaceId) -> Option<usize> {
        self.surfaces().get(&surface).map(|s| s.cursor)
    }

    pub fn set_viewport(&self, surface: SurfaceId, viewport: Viewport) -> bool {
        match self.surfaces().get_mut(&surface) {
            Some(s) => {
                s.viewport = viewport;
                true
            }
            None => false,
        }
    }

    /// Type `text` at the cursor and queue the matching edit.
    pub fn type_text(&self, surface: SurfaceId, text: &str) -> bool {
        {
            let mut surfaces = self.surfaces();
            let Some(s) = surfaces.get_mut(&surface) else {
                return false;
            };
            let at = byte_index(&s.text, s.cursor);
            s.text.insert_str(at, text);
            s.cursor += text.chars().count();
        }
        self.post(HostEvent::Edit(
            surface,
            EditEvent::Insert {
                text: text.to_string(),
            },
        ))
    }

    /// Delete the character before the cursor and queue the matching edit.
    pub fn delete_backward(&self, surface: SurfaceId) -> bool {
        {
            let mut surfaces = self.surfaces();
            let Some(s) = surfaces.get_mut(&surface) else {
                return false;
            };
            if s.cursor > 0 {
                let end = byte_index(&s.text, s.cursor);
                let start = byte_index(&s.text, s.cursor - 1);
                s.text.replace_range(start..end, "");
                s.cursor -= 1;
            }
        }
        self.post(HostEvent::Edit(surface, EditEvent::DeleteBackward))
    }

    fn surfaces(&self) -> MutexGuard<'_, HashMap<SurfaceId, Surface>> {
        lock(&self.surfaces)
    }
}

impl Host for MemoryHost {
    fn create_surface(&self) -> SurfaceId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.surfaces().insert(
            id,
            Surface {
                text: String::new(),
                cursor: 0,
                viewport: self.default_viewport,
            },
        );
        id
    }

    fn close_surface(&self, surface: SurfaceId) {
        self.surfaces().remove(&surface);
    }

    fn surface_exists(&self, surface: SurfaceId) -> bool {
        self.surfaces().contains_key(&surface)
    }

    fn viewport(&self, surface: SurfaceId) -> Option<Viewport> {
        self.surfaces().get(&surface).map(|s| s.viewport)
    }

    fn content_len(&self, surface: SurfaceId) -> Option<usize> {
        self.surfaces().get(&surface).map(|s| s.text.chars().count())
    }

    fn replace_range(&self, surface: SurfaceId, range: Range<usize>, text: &str) -> bool {
        let mut surfaces = self.surfaces();
        let Some(s) = surfaces.get_mut(&surface) else {
            return false;
        };
        let start = byte_index(&s.text, range.start);
        let end = byte_index(&s.text, range.end.max(range.start));
        s.text.replace_range(start..end, text);
        s.cursor = s.cursor.min(s.text.chars().count());
        true
    }

    fn set_cursor(&self, surface: SurfaceId, offset: usize) -> bool {
        let mut surfaces = self.surfaces();
        let Some(s) = surfaces.get_mut(&surface) else {
            return false;
        };
        s.cursor = offset.min(s.text.chars().count());
        true
    }

    fn request_redraw(&self, surface: SurfaceId) -> bool {
        self.surface_exists(surface) && self.post(HostEvent::Redraw(surface))
    }

    fn spawn_task(&self, name: String, task: Box<dyn FnOnce() + Send>) -> io::Result<()> {
        std::thread::Builder::new().name(name).spawn(task).map(|_| ())
    }
}

/// Byte index of the `offset`th character, clamped to the end.
fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> (MemoryHost, Receiver<HostEvent>) {
        MemoryHost::new(Viewport::from_cells(80, 24))
    }

    #[test]
    fn test_replace_range_counts_chars() {
        let (host, _rx) = host();
        let id = host.create_surface();
        assert!(host.replace_range(id, 0..0, "héllo"));
        assert!(host.replace_range(id, 1..2, "e"));
        assert_eq!(host.text(id).unwrap(), "hello");

        assert!(host.replace_range(id, 0..99, "x"));
        assert_eq!(host.text(id).unwrap(), "x");
    }

    #[test]
    fn test_cursor_is_clamped() {
        let (host, _rx) = host();
        let id = host.create_surface();
        host.replace_range(id, 0..0, "abc");
        host.set_cursor(id, 10);
        assert_eq!(host.cursor(id), Some(3));

        host.replace_range(id, 0..3, "a");
        assert_eq!(host.cursor(id), Some(1));
    }

    #[test]
    fn test_typing_edits_locally_and_queues() {
        let (host, rx) = host();
        let id = host.create_surface();
        host.type_text(id, "ab");
        host.delete_backward(id);

        assert_eq!(host.text(id).unwrap(), "a");
        assert_eq!(host.cursor(id), Some(1));
        assert_eq!(
            rx.try_recv().unwrap(),
            HostEvent::Edit(id, EditEvent::Insert { text: "ab".into() })
        );
        assert_eq!(rx.try_recv().unwrap(), HostEvent::Edit(id, EditEvent::DeleteBackward));
    }

    #[test]
    fn test_redraw_after_close_fails() {
        let (host, rx) = host();
        let id = host.create_surface();
        assert!(host.request_redraw(id));
        assert_eq!(rx.try_recv().unwrap(), HostEvent::Redraw(id));

        host.close_surface(id);
        assert!(!host.request_redraw(id));
        assert!(!host.surface_exists(id));
        assert!(!host.type_text(id, "x"));
    }

    #[test]
    fn test_surface_ids_are_unique() {
        let (host, _rx) = host();
        let a = host.create_surface();
        let b = host.create_surface();
        assert_ne!(a, b);
        assert_eq!(host.viewport(a), Some(Viewport::from_cells(80, 24)));
    }
}
