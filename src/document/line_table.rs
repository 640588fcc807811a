//! Line table: indexable by (line, UTF-16 column) and (line, UTF-8 byte
//! column), with splice-style incremental edits.
//!
//! Backed by [`ropey::Rope`] for O(log n) line lookups. Ropey itself
//! indexes by `char`, not UTF-16 code unit, so every position conversion
//! here walks the target line once to translate between UTF-16 columns
//! (what the LSP wire format uses), UTF-8 byte columns (what the index
//! and the syntactic rename resolver report), and `char` offsets (what
//! `Rope` wants). This walk is the bijective byte↔UTF-16 conversion the
//! data model requires; it is only inaccurate, per the open question in
//! the design notes, when matching UTF-8 columns against on-disk text
//! that no longer agrees with what produced them.

use ropey::Rope;
use tower_lsp::lsp_types::{Position, Range};

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct LineTable {
    rope: Rope,
}

impl LineTable {
    pub fn from_str(text: &str) -> Self {
        Self { rope: Rope::from_str(text) }
    }

    pub fn to_string(&self) -> String {
        self.rope.to_string()
    }

    /// Line count equals one plus the count of line terminators — ropey
    /// maintains this invariant natively.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line_str(&self, line: usize) -> Option<String> {
        if line >= self.rope.len_lines() {
            return None;
        }
        Some(self.rope.line(line).to_string())
    }

    /// Converts a UTF-16 column on `line` to a `char` offset within that
    /// line. Clamps to the line's length if `utf16_col` runs past the end
    /// of content actually present (common for a position just past the
    /// last character before a line terminator).
    fn utf16_col_to_char_col(line_text: &str, utf16_col: usize) -> usize {
        let mut utf16_count = 0usize;
        for (char_idx, ch) in line_text.chars().enumerate() {
            if utf16_count >= utf16_col {
                return char_idx;
            }
            utf16_count += ch.len_utf16();
        }
        line_text.chars().count()
    }

    fn char_col_to_utf16_col(line_text: &str, char_col: usize) -> usize {
        line_text.chars().take(char_col).map(|c| c.len_utf16()).sum()
    }

    fn utf8_col_to_char_col(line_text: &str, byte_col: usize) -> Option<usize> {
        if byte_col == 0 {
            return Some(0);
        }
        let mut last_char_idx = 0;
        for (char_idx, (byte_idx, _)) in line_text.char_indices().enumerate() {
            if byte_idx == byte_col {
                return Some(char_idx);
            }
            last_char_idx = char_idx + 1;
        }
        if byte_col == line_text.len() {
            Some(last_char_idx)
        } else {
            None
        }
    }

    fn char_col_to_utf8_col(line_text: &str, char_col: usize) -> usize {
        line_text
            .char_indices()
            .nth(char_col)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(line_text.len())
    }

    fn position_to_char_offset(&self, position: Position) -> Option<usize> {
        let line_text = self.line_str(position.line as usize)?;
        let char_col = Self::utf16_col_to_char_col(&line_text, position.character as usize);
        let line_start = self.rope.line_to_char(position.line as usize);
        Some(line_start + char_col)
    }

    /// Converts a 0-based (line, UTF-8 byte column) pair, as reported by
    /// the persistent index, to a 0-based (line, UTF-16 column)
    /// position. Returns `None` if the line does not exist or the byte
    /// column does not land on a character boundary — this can happen
    /// when the on-disk file has drifted from what the index saw.
    pub fn utf8_to_utf16_position(&self, line: usize, utf8_col: usize) -> Option<Position> {
        let line_text = self.line_str(line)?;
        let char_col = Self::utf8_col_to_char_col(&line_text, utf8_col)?;
        let utf16_col = Self::char_col_to_utf16_col(&line_text, char_col);
        Some(Position::new(line as u32, utf16_col as u32))
    }

    /// Converts a 0-based (line, UTF-16 column) `Position` to a 0-based
    /// (line, UTF-8 byte column) pair, clamping the column to the line's
    /// length.
    pub fn utf16_to_utf8_column(&self, position: Position) -> Option<(usize, usize)> {
        let line_text = self.line_str(position.line as usize)?;
        let char_col = Self::utf16_col_to_char_col(&line_text, position.character as usize);
        let utf8_col = Self::char_col_to_utf8_col(&line_text, char_col);
        Some((position.line as usize, utf8_col))
    }

    /// Applies an incremental edit over `range`, replacing it with
    /// `new_text`. Fails with [`CoreError::InvalidRange`] if the range's
    /// endpoints are not contiguous (end before start, or either endpoint
    /// outside the document).
    pub fn splice(&mut self, range: Range, new_text: &str) -> Result<(), CoreError> {
        if range.end < range.start {
            return Err(CoreError::InvalidRange(range));
        }
        let start = self
            .position_to_char_offset(range.start)
            .ok_or(CoreError::InvalidRange(range))?;
        let end = self
            .position_to_char_offset(range.end)
            .ok_or(CoreError::InvalidRange(range))?;
        if end < start {
            return Err(CoreError::InvalidRange(range));
        }
        self.rope.remove(start..end);
        self.rope.insert(start, new_text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_replaces_range() {
        let mut table = LineTable::from_str("let foo = 1\nprint(foo)");
        table
            .splice(Range::new(Position::new(0, 4), Position::new(0, 7)), "bar")
            .unwrap();
        assert_eq!(table.to_string(), "let bar = 1\nprint(foo)");
    }

    #[test]
    fn splice_at_end_of_line_appends_without_new_line() {
        let mut table = LineTable::from_str("abc\ndef");
        let end = Position::new(0, 3);
        table.splice(Range::new(end, end), "XYZ").unwrap();
        assert_eq!(table.to_string(), "abcXYZ\ndef");
        assert_eq!(table.line_count(), 2);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut table = LineTable::from_str("abcdef");
        let err = table
            .splice(Range::new(Position::new(0, 4), Position::new(0, 1)), "x")
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange(_)));
    }

    #[test]
    fn utf16_utf8_roundtrip_is_bijective_within_bmp() {
        let table = LineTable::from_str("héllo wörld");
        for col in 0..=11usize {
            let pos = Position::new(0, col as u32);
            if let Some((_, utf8_col)) = table.utf16_to_utf8_column(pos) {
                let back = table.utf8_to_utf16_position(0, utf8_col).unwrap();
                assert_eq!(back.character as usize, col);
            }
        }
    }

    #[test]
    fn line_count_matches_terminator_count_plus_one() {
        let table = LineTable::from_str("a\nb\nc");
        assert_eq!(table.line_count(), 3);
        let table = LineTable::from_str("");
        assert_eq!(table.line_count(), 1);
    }
}
