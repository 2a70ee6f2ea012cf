//! Forwards user edits on a terminal surface to its shell.
//!
//! The host applies every edit to the surface itself. The router only
//! relays the keystroke; the shell's echo comes back through the read pump
//! and the next render replaces the local edit.

use std::sync::Arc;

use tether_pty::{Result, SurfaceId};

use crate::host::{EditEvent, Host};
use crate::state::TerminalState;

/// Bytes the shell should receive for `event`, if any.
pub fn encode_edit(event: &EditEvent, erase_char: u8) -> Option<Vec<u8>> {
    match event {
        EditEvent::Insert { text } if !text.is_empty() => Some(text.as_bytes().to_vec()),
        EditEvent::Insert { .. } | EditEvent::Other => None,
        EditEvent::DeleteBackward => Some(vec![erase_char]),
    }
}

pub struct InputRouter {
    host: Arc<dyn Host>,
    state: Arc<TerminalState>,
}

impl InputRouter {
    pub fn new(host: Arc<dyn Host>, state: Arc<TerminalState>) -> Self {
        Self { host, state }
    }

    /// Handle an edit the host made on `surface`.
    ///
    /// Surfaces without a session are left alone. A failed write has
    /// already torn the session down when the error comes back.
    pub fn on_edit(&self, surface: SurfaceId, event: &EditEvent) -> Result<()> {
        let Some(session) = self.state.registry.get(surface) else {
            return Ok(());
        };
        let Some(bytes) = encode_edit(event, self.state.config().erase_char) else {
            return Ok(());
        };

        self.state.invalidate(surface);
        session.write_input(&bytes)?;

        // Undo the host's cursor movement until the echo arrives.
        let offset = session.snapshot().cursor_offset();
        self.host.set_cursor(surface, offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_pty::config::BACKSPACE;

    fn insert(text: &str) -> EditEvent {
        EditEvent::Insert {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_insert_is_sent_verbatim() {
        assert_eq!(encode_edit(&insert("x"), BACKSPACE), Some(vec![0x78]));
        assert_eq!(encode_edit(&insert("ls -l\n"), BACKSPACE), Some(b"ls -l\n".to_vec()));
        assert_eq!(
            encode_edit(&insert("é"), BACKSPACE),
            Some("é".as_bytes().to_vec())
        );
    }

    #[test]
    fn test_delete_sends_erase_char() {
        assert_eq!(encode_edit(&EditEvent::DeleteBackward, BACKSPACE), Some(vec![0x08]));
        assert_eq!(encode_edit(&EditEvent::DeleteBackward, 0x7f), Some(vec![0x7f]));
    }

    #[test]
    fn test_other_edits_are_dropped() {
        assert_eq!(encode_edit(&EditEvent::Other, BACKSPACE), None);
        assert_eq!(encode_edit(&insert(""), BACKSPACE), None);
    }
}
