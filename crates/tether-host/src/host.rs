//! The embedding editor as seen by the terminal layer.
//!
//! A host owns text surfaces (buffers shown in windows). The terminal layer
//! only ever touches them through [`Host`]; every offset is in characters.

use std::io;
use std::ops::Range;

use tether_pty::{SurfaceId, WindowSize};

/// Pixel geometry of the area a surface is displayed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width_px: f32,
    pub height_px: f32,
    /// Width of one character cell.
    pub em_width: f32,
    pub line_height: f32,
}

impl Viewport {
    /// A viewport exactly `cols` by `rows` cells of 1px each.
    pub fn from_cells(cols: u16, rows: u16) -> Self {
        Self {
            width_px: f32::from(cols),
            height_px: f32::from(rows),
            em_width: 1.0,
            line_height: 1.0,
        }
    }

    /// Whole cells that fit, never fewer than one in either direction.
    pub fn cells(&self) -> WindowSize {
        WindowSize::new(
            fit(self.width_px, self.em_width),
            fit(self.height_px, self.line_height),
        )
    }
}

fn fit(extent: f32, cell: f32) -> u16 {
    if cell.is_nan() || cell <= 0.0 || !extent.is_finite() {
        return 1;
    }
    // `as` saturates, NaN becomes 0.
    ((extent / cell).floor() as u16).max(1)
}

/// A user edit on a surface, already applied locally by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEvent {
    Insert { text: String },
    DeleteBackward,
    /// Anything else (yank, undo, region kill). Not forwarded.
    Other,
}

/// Surface operations the terminal layer needs from its host.
///
/// Implementations are shared between the host's own thread and the read
/// pumps, so every method takes `&self`.
pub trait Host: Send + Sync {
    /// Create an empty surface.
    fn create_surface(&self) -> SurfaceId;

    /// Destroy a surface. Unknown ids are ignored.
    fn close_surface(&self, surface: SurfaceId);

    fn surface_exists(&self, surface: SurfaceId) -> bool;

    /// Geometry of the surface's display area, `None` if it is gone.
    fn viewport(&self, surface: SurfaceId) -> Option<Viewport>;

    /// Length of the surface's content in characters.
    fn content_len(&self, surface: SurfaceId) -> Option<usize>;

    /// Replace the characters in `range` with `text`. Returns `false` if
    /// the surface is gone.
    fn replace_range(&self, surface: SurfaceId, range: Range<usize>, text: &str) -> bool;

    /// Move the surface's cursor to a character offset.
    fn set_cursor(&self, surface: SurfaceId, offset: usize) -> bool;

    /// Ask for a redraw of `surface` on the host's own thread, which then
    /// calls [`crate::TerminalCommands::refresh_surface`]. Returns `false`
    /// once the surface no longer exists.
    fn request_redraw(&self, surface: SurfaceId) -> bool;

    /// Run `task` in the background.
    fn spawn_task(&self, name: String, task: Box<dyn FnOnce() + Send>) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(width_px: f32, height_px: f32) -> Viewport {
        Viewport {
            width_px,
            height_px,
            em_width: 8.0,
            line_height: 16.0,
        }
    }

    #[test]
    fn test_cells_floor() {
        assert_eq!(viewport(640.0, 384.0).cells(), WindowSize::new(80, 24));
        assert_eq!(viewport(647.9, 399.0).cells(), WindowSize::new(80, 24));
    }

    #[test]
    fn test_cells_never_zero() {
        assert_eq!(viewport(0.0, 0.0).cells(), WindowSize::new(1, 1));
        assert_eq!(viewport(3.0, 15.0).cells(), WindowSize::new(1, 1));
        assert_eq!(viewport(-20.0, f32::NAN).cells(), WindowSize::new(1, 1));

        let degenerate = Viewport {
            em_width: 0.0,
            ..viewport(640.0, 384.0)
        };
        assert_eq!(degenerate.cells(), WindowSize::new(1, 24));
    }

    #[test]
    fn test_from_cells() {
        assert_eq!(Viewport::from_cells(100, 30).cells(), WindowSize::new(100, 30));
    }
}
