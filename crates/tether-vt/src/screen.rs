use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::index::{Column, Line};
use alacritty_terminal::term::cell::Flags as AlacFlags;
use alacritty_terminal::term::Term;

use crate::cursor_map;
use crate::terminal::EventProxy;

/// Current state of the cursor, in grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorState {
    pub row: u16,
    pub col: u16,
}

/// A read-only view into the terminal screen.
pub struct ScreenView<'a> {
    term: &'a Term<EventProxy>,
}

impl<'a> ScreenView<'a> {
    pub(crate) fn new(term: &'a Term<EventProxy>) -> Self {
        Self { term }
    }

    /// Number of visible rows.
    pub fn rows(&self) -> u16 {
        self.term.screen_lines() as u16
    }

    /// Number of columns.
    pub fn cols(&self) -> u16 {
        self.term.columns() as u16
    }

    /// Text of one row with spacer cells of wide characters left out.
    ///
    /// Also returns, for every grid column (plus one past the end), the number
    /// of characters of the returned text that lie left of that column.
    pub fn row_text(&self, row: u16) -> (String, Vec<usize>) {
        let cols = self.term.columns();
        let mut text = String::with_capacity(cols);
        let mut char_index = Vec::with_capacity(cols + 1);
        let mut chars = 0;

        if (row as usize) < self.term.screen_lines() {
            let grid_row = &self.term.grid()[Line(row as i32)];
            for col in 0..cols {
                char_index.push(chars);
                let cell = &grid_row[Column(col)];
                if cell
                    .flags
                    .intersects(AlacFlags::WIDE_CHAR_SPACER | AlacFlags::LEADING_WIDE_CHAR_SPACER)
                {
                    continue;
                }
                text.push(cell.c);
                chars += 1;
            }
        }
        char_index.push(chars);
        (text, char_index)
    }
}

/// Immutable plain-text picture of the screen.
///
/// Lines have trailing blanks removed, except that the cursor's line is kept
/// at least as long as the cursor column. Empty lines below both the cursor
/// and the last non-empty line are dropped. `cursor_col` counts characters of
/// its line, not grid cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenSnapshot {
    pub lines: Vec<String>,
    pub cursor_row: usize,
    pub cursor_col: usize,
}

impl ScreenSnapshot {
    pub(crate) fn capture(view: &ScreenView<'_>, cursor: CursorState) -> Self {
        let cursor_row = cursor.row as usize;
        let mut cursor_col = 0;
        let mut lines = Vec::with_capacity(view.rows() as usize);

        for row in 0..view.rows() {
            let (text, char_index) = view.row_text(row);
            let mut line = text.trim_end_matches(' ').to_string();
            if row as usize == cursor_row {
                let col = (cursor.col as usize).min(char_index.len() - 1);
                cursor_col = char_index[col];
                let len = line.chars().count();
                if len < cursor_col {
                    line.extend(std::iter::repeat(' ').take(cursor_col - len));
                }
            }
            lines.push(line);
        }

        while lines.len() > cursor_row + 1 && lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        Self {
            lines,
            cursor_row,
            cursor_col,
        }
    }

    /// The surface text for this snapshot.
    pub fn text(&self) -> String {
        cursor_map::join_lines(&self.lines)
    }

    /// Offset of the cursor in [`ScreenSnapshot::text`].
    pub fn cursor_offset(&self) -> usize {
        cursor_map::offset_of(&self.lines, self.cursor_row, self.cursor_col)
    }

    /// First line, or the empty string for a blank screen.
    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }
}
