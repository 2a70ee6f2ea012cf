//! tether-host: runs shells inside an editor's text surfaces.
//!
//! The editor implements [`Host`]; this crate drives sessions from
//! `tether-pty` against it.
//!
//! - [`TerminalCommands`]: the editor's entry points (new terminal, refresh,
//!   viewport change, close).
//! - [`InputRouter`]: relays the editor's edits on a terminal surface to
//!   the shell.
//! - [`read_pump`]: one task per session draining shell output and asking
//!   the editor to redraw.
//! - [`MemoryHost`]: a host with in-memory surfaces.

pub mod commands;
pub mod host;
pub mod input;
pub mod memory;
pub mod read_pump;
pub mod render;
pub mod state;

pub use commands::TerminalCommands;
pub use host::{EditEvent, Host, Viewport};
pub use input::InputRouter;
pub use memory::{HostEvent, MemoryHost};
pub use read_pump::{PumpExit, PumpSettings};
pub use state::TerminalState;
