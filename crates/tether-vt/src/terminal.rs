use std::sync::{Arc, Mutex, MutexGuard};

use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::term::{Config, Term};
use alacritty_terminal::vte::ansi;

use crate::screen::{CursorState, ScreenSnapshot, ScreenView};

/// Shared event state captured from the terminal.
#[derive(Default)]
struct EventState {
    title: Option<String>,
    pty_writes: Vec<String>,
}

/// Event proxy that captures terminal events.
///
/// `Term` only hands events to `&self`, so the state lives behind a mutex.
#[derive(Clone)]
pub struct EventProxy {
    state: Arc<Mutex<EventState>>,
}

impl EventProxy {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EventState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventListener for EventProxy {
    fn send_event(&self, event: Event) {
        let mut state = self.lock();
        match event {
            Event::Title(title) => {
                state.title = Some(title);
            }
            Event::ResetTitle => {
                state.title = None;
            }
            Event::PtyWrite(data) => {
                state.pty_writes.push(data);
            }
            _ => {}
        }
    }
}

/// Dimensions helper for creating / resizing the terminal.
struct TermSize {
    columns: usize,
    screen_lines: usize,
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.screen_lines
    }

    fn screen_lines(&self) -> usize {
        self.screen_lines
    }

    fn columns(&self) -> usize {
        self.columns
    }
}

/// Screen model tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VtOptions {
    /// Lines of scrollback history kept above the viewport.
    pub scrollback: usize,
    /// Treat a bare line feed as carriage return + line feed.
    ///
    /// On by default, so output that never went through ONLCR still starts
    /// each line at column 0. The cost is that a program which turns off
    /// OPOST/ONLCR and moves down with a bare LF to keep its column (full
    /// screen editors, pagers) is drawn starting at column 0 instead.
    pub newline_mode: bool,
}

impl Default for VtOptions {
    fn default() -> Self {
        Self {
            scrollback: 10_000,
            newline_mode: true,
        }
    }
}

/// The screen model a session feeds its shell's output into.
pub struct VtTerminal {
    term: Term<EventProxy>,
    parser: ansi::Processor,
    event_proxy: EventProxy,
    newline_mode: bool,
}

impl VtTerminal {
    /// Create a terminal with default options.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_options(cols, rows, VtOptions::default())
    }

    pub fn with_options(cols: u16, rows: u16, options: VtOptions) -> Self {
        let config = Config {
            scrolling_history: options.scrollback,
            ..Config::default()
        };

        let size = TermSize {
            columns: cols.max(1) as usize,
            screen_lines: rows.max(1) as usize,
        };

        let event_proxy = EventProxy::new();
        let term = Term::new(config, &size, event_proxy.clone());

        Self {
            term,
            parser: ansi::Processor::new(),
            event_proxy,
            newline_mode: options.newline_mode,
        }
    }

    /// Feed raw PTY output bytes into the terminal.
    pub fn write(&mut self, bytes: &[u8]) {
        if !self.newline_mode {
            self.parser.advance(&mut self.term, bytes);
            return;
        }

        // LF never occurs inside a UTF-8 sequence, and a CR in front of it
        // is a no-op wherever LF itself is ignored.
        let mut chunks = bytes.split(|&b| b == b'\n').peekable();
        while let Some(chunk) = chunks.next() {
            self.parser.advance(&mut self.term, chunk);
            if chunks.peek().is_some() {
                self.parser.advance(&mut self.term, b"\r\n");
            }
        }
    }

    /// Resize the terminal to new dimensions.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let size = TermSize {
            columns: cols.max(1) as usize,
            screen_lines: rows.max(1) as usize,
        };
        self.term.resize(size);
    }

    /// Get a read-only view of the terminal screen.
    pub fn screen(&self) -> ScreenView<'_> {
        ScreenView::new(&self.term)
    }

    /// Get the current cursor position.
    pub fn cursor(&self) -> CursorState {
        let content = self.term.renderable_content();
        let cursor = &content.cursor;

        CursorState {
            row: cursor.point.line.0.max(0) as u16,
            col: cursor.point.column.0 as u16,
        }
    }

    /// Capture the visible screen as plain text lines plus cursor.
    pub fn snapshot(&self) -> ScreenSnapshot {
        ScreenSnapshot::capture(&self.screen(), self.cursor())
    }

    /// Get the current window title as set by OSC escape sequences.
    pub fn title_owned(&self) -> Option<String> {
        self.event_proxy.lock().title.clone()
    }

    /// Drain replies the terminal owes the shell (device status, cursor
    /// position reports).
    pub fn take_pty_writes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.event_proxy.lock().pty_writes)
    }
}
