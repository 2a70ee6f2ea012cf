//! Writes a session's screen into its host surface.

use tether_pty::PtySession;

use crate::host::Host;
use crate::state::TerminalState;

/// Replace the surface's content with the session's screen and move the
/// surface cursor to the terminal cursor.
///
/// The content is only rewritten when it differs from what was last
/// rendered; the cursor is placed either way. Returns `false` if the surface
/// is gone.
pub fn render_session(host: &dyn Host, state: &TerminalState, session: &PtySession) -> bool {
    let surface = session.surface_id();
    if !host.surface_exists(surface) {
        return false;
    }

    let snapshot = session.snapshot();
    let text = snapshot.text();

    if state.update_rendered(surface, &text) {
        let len = host.content_len(surface).unwrap_or(0);
        if !host.replace_range(surface, 0..len, &text) {
            state.invalidate(surface);
            return false;
        }
        log::trace!("surface {surface}: rendered {} lines", snapshot.lines.len());
    }

    host.set_cursor(surface, snapshot.cursor_offset())
}
