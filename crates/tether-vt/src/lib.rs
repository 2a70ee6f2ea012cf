//! tether-vt: Screen model for tether.
//!
//! Wraps `alacritty_terminal` behind a small API: feed shell output in, read
//! a plain-text [`ScreenSnapshot`] and cursor out. The [`cursor_map`] module
//! owns the single join policy shared by the render path and cursor placement.

pub mod cursor_map;
pub mod screen;
pub mod terminal;

pub use cursor_map::{cursor_at, join_lines, line_span, offset_of, LINE_DELIMITER};
pub use screen::{CursorState, ScreenSnapshot, ScreenView};
pub use terminal::{VtOptions, VtTerminal};
