//! Translation between screen coordinates and linear text offsets.
//!
//! The render path flattens a snapshot with [`join_lines`] and cursor
//! placement measures lines with [`line_span`]. Both are defined in terms of
//! [`LINE_DELIMITER`]; changing one without the other shifts the cursor by one
//! character per line, so nothing outside this module should join lines.
//!
//! Offsets and columns count `char`s, not bytes.

/// Delimiter placed between lines when flattening a snapshot. The final line
/// carries no trailing delimiter.
pub const LINE_DELIMITER: &str = "\n";

fn delimiter_len() -> usize {
    LINE_DELIMITER.chars().count()
}

/// Characters a non-final line occupies in the flattened text, delimiter
/// included.
pub fn line_span(line: &str) -> usize {
    line.chars().count() + delimiter_len()
}

/// Flatten lines into the text shown on a surface.
pub fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut text = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            text.push_str(LINE_DELIMITER);
        }
        text.push_str(line.as_ref());
    }
    text
}

/// Offset of `(row, col)` in the text produced by [`join_lines`].
///
/// `col` is clamped to the length of its line and a `row` past the last line
/// maps to the end of the text, so the result is always a valid offset.
pub fn offset_of<S: AsRef<str>>(lines: &[S], row: usize, col: usize) -> usize {
    let above: usize = lines.iter().take(row).map(|l| line_span(l.as_ref())).sum();
    match lines.get(row) {
        Some(line) => above + col.min(line.as_ref().chars().count()),
        // `above` counted a delimiter after the last line, which join_lines
        // never emits.
        None => above.saturating_sub(if lines.is_empty() { 0 } else { delimiter_len() }),
    }
}

/// Inverse of [`offset_of`]: the `(row, col)` an offset falls on.
///
/// An offset inside a delimiter resolves to the end of the preceding line; an
/// offset past the end resolves to the end of the last line.
pub fn cursor_at<S: AsRef<str>>(lines: &[S], offset: usize) -> (usize, usize) {
    let mut remaining = offset;
    for (row, line) in lines.iter().enumerate() {
        let len = line.as_ref().chars().count();
        let is_last = row + 1 == lines.len();
        if is_last || remaining < len + delimiter_len() {
            return (row, remaining.min(len));
        }
        remaining -= len + delimiter_len();
    }
    (0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_offset_between_d_and_e() {
        let lines = ["abc", "de"];
        let offset = offset_of(&lines, 1, 1);
        assert_eq!(offset, "abc".len() + LINE_DELIMITER.len() + 1);

        let text = join_lines(&lines);
        let (before, after) = text.split_at(offset);
        assert!(before.ends_with('d'));
        assert!(after.starts_with('e'));
    }

    #[test]
    fn test_join_has_no_trailing_delimiter() {
        assert_eq!(join_lines(&["a", "b", ""]), "a\nb\n");
        assert_eq!(join_lines(&["only"]), "only");
        assert_eq!(join_lines::<&str>(&[]), "");
    }

    #[test]
    fn test_offset_clamps() {
        let lines = ["abc", "de"];
        assert_eq!(offset_of(&lines, 0, 10), 3);
        assert_eq!(offset_of(&lines, 7, 0), join_lines(&lines).chars().count());
        assert_eq!(offset_of::<&str>(&[], 3, 3), 0);
    }

    #[test]
    fn test_cursor_at() {
        let lines = ["abc", "de"];
        assert_eq!(cursor_at(&lines, 0), (0, 0));
        assert_eq!(cursor_at(&lines, 3), (0, 3));
        assert_eq!(cursor_at(&lines, 4), (1, 0));
        assert_eq!(cursor_at(&lines, 5), (1, 1));
        assert_eq!(cursor_at(&lines, 99), (1, 2));
    }

    #[test]
    fn test_wide_chars_count_once() {
        let lines = ["日本", "x"];
        assert_eq!(offset_of(&lines, 1, 0), 3);
        assert_eq!(cursor_at(&lines, 1), (0, 1));
    }

    proptest! {
        #[test]
        fn prop_offset_round_trips(
            lines in prop::collection::vec("[a-z ]{0,12}", 1..8),
            row_seed in any::<usize>(),
            col_seed in any::<usize>(),
        ) {
            let row = row_seed % lines.len();
            let col = col_seed % (lines[row].len() + 1);
            let offset = offset_of(&lines, row, col);
            prop_assert_eq!(cursor_at(&lines, offset), (row, col));
        }

        #[test]
        fn prop_offset_matches_joined_text(
            lines in prop::collection::vec("[a-z]{0,12}", 1..8),
            row_seed in any::<usize>(),
        ) {
            let row = row_seed % lines.len();
            let offset = offset_of(&lines, row, 0);
            let text = join_lines(&lines);
            let rest: String = text.chars().skip(offset).collect();
            prop_assert!(rest.starts_with(lines[row].as_str()));
            if row > 0 {
                let before: String = text.chars().take(offset).collect();
                prop_assert!(before.ends_with(LINE_DELIMITER));
            }
        }
    }
}
