use std::ops::Range;

use unicode_width::UnicodeWidthStr;

/// A plain string with a cursor and an optional selection anchor.
///
/// Offsets are byte offsets and always sit on character boundaries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    cursor: usize,
    anchor: Option<usize>,
    preferred_column: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorPosition {
    pub line: usize,
    /// Display column, in terminal cells.
    pub column: usize,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.len();
        Self {
            text,
            cursor,
            anchor: None,
            preferred_column: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replaces the text, keeping the cursor where it still fits.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.floor_boundary(self.cursor);
        self.anchor = None;
        self.preferred_column = None;
    }

    pub fn set_cursor(&mut self, offset: usize) {
        self.cursor = self.floor_boundary(offset);
        self.anchor = None;
        self.preferred_column = None;
    }

    pub fn selection(&self) -> Option<Range<usize>> {
        let anchor = self.anchor?;
        if anchor == self.cursor {
            return None;
        }
        Some(anchor.min(self.cursor)..anchor.max(self.cursor))
    }

    pub fn selected_text(&self) -> Option<&str> {
        self.selection().map(|range| &self.text[range])
    }

    pub fn clear_selection(&mut self) {
        self.anchor = None;
    }

    pub fn select_all(&mut self) {
        self.anchor = Some(0);
        self.cursor = self.text.len();
    }

    pub fn insert_char(&mut self, ch: char) {
        let mut encoded = [0u8; 4];
        self.insert_str(ch.encode_utf8(&mut encoded));
    }

    /// Inserts at the cursor, replacing the selection if there is one.
    pub fn insert_str(&mut self, text: &str) {
        if let Some(range) = self.selection() {
            self.text.replace_range(range.clone(), "");
            self.cursor = range.start;
        }
        self.text.insert_str(self.cursor, text);
        self.cursor += text.len();
        self.anchor = None;
        self.preferred_column = None;
    }

    pub fn backspace(&mut self) -> bool {
        if self.delete_selection() {
            return true;
        }
        if self.cursor == 0 {
            return false;
        }
        let start = self.prev_boundary(self.cursor);
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
        self.preferred_column = None;
        true
    }

    pub fn delete_forward(&mut self) -> bool {
        if self.delete_selection() {
            return true;
        }
        if self.cursor >= self.text.len() {
            return false;
        }
        let end = self.next_boundary(self.cursor);
        self.text.replace_range(self.cursor..end, "");
        self.preferred_column = None;
        true
    }

    /// Surrounds the selection (or the cursor) with `before` and `after`
    /// and selects the original text again.
    pub fn wrap_selection(&mut self, before: &str, after: &str) {
        let range = self.selection().unwrap_or(self.cursor..self.cursor);
        let selected = self.text[range.clone()].to_string();
        let wrapped = format!("{before}{selected}{after}");
        self.text.replace_range(range.clone(), &wrapped);
        let inner_start = range.start + before.len();
        self.anchor = Some(inner_start);
        self.cursor = inner_start + selected.len();
        self.preferred_column = None;
    }

    pub fn move_left(&mut self, extend: bool) -> bool {
        self.prepare(extend);
        if self.cursor == 0 {
            return false;
        }
        self.cursor = self.prev_boundary(self.cursor);
        self.preferred_column = None;
        true
    }

    pub fn move_right(&mut self, extend: bool) -> bool {
        self.prepare(extend);
        if self.cursor >= self.text.len() {
            return false;
        }
        self.cursor = self.next_boundary(self.cursor);
        self.preferred_column = None;
        true
    }

    pub fn move_home(&mut self, extend: bool) {
        self.prepare(extend);
        self.cursor = self.line_start(self.cursor);
        self.preferred_column = None;
    }

    pub fn move_end(&mut self, extend: bool) {
        self.prepare(extend);
        self.cursor = self.line_end(self.cursor);
        self.preferred_column = None;
    }

    /// Moves by `delta` lines, keeping the column the cursor came from.
    pub fn move_vertical(&mut self, delta: isize, extend: bool) -> bool {
        self.prepare(extend);
        let start = self.line_start(self.cursor);
        let column = *self
            .preferred_column
            .get_or_insert_with(|| self.text[start..self.cursor].chars().count());

        let mut line_start = start;
        let mut remaining = delta.unsigned_abs();
        while remaining > 0 {
            if delta < 0 {
                if line_start == 0 {
                    break;
                }
                line_start = self.line_start(line_start - 1);
            } else {
                let end = self.line_end(line_start);
                if end >= self.text.len() {
                    break;
                }
                line_start = end + 1;
            }
            remaining -= 1;
        }
        if line_start == start {
            return false;
        }

        let line_end = self.line_end(line_start);
        self.cursor = self.text[line_start..line_end]
            .char_indices()
            .nth(column)
            .map_or(line_end, |(idx, _)| line_start + idx);
        true
    }

    pub fn cursor_position(&self) -> CursorPosition {
        let start = self.line_start(self.cursor);
        CursorPosition {
            line: self.text[..self.cursor].matches('\n').count(),
            column: self.text[start..self.cursor].width(),
        }
    }

    fn delete_selection(&mut self) -> bool {
        let Some(range) = self.selection() else {
            self.anchor = None;
            return false;
        };
        self.text.replace_range(range.clone(), "");
        self.cursor = range.start;
        self.anchor = None;
        self.preferred_column = None;
        true
    }

    fn prepare(&mut self, extend: bool) {
        if extend {
            self.anchor.get_or_insert(self.cursor);
        } else {
            self.anchor = None;
        }
    }

    fn floor_boundary(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }

    fn prev_boundary(&self, offset: usize) -> usize {
        self.text[..offset]
            .chars()
            .next_back()
            .map_or(0, |ch| offset - ch.len_utf8())
    }

    fn next_boundary(&self, offset: usize) -> usize {
        self.text[offset..]
            .chars()
            .next()
            .map_or(offset, |ch| offset + ch.len_utf8())
    }

    fn line_start(&self, offset: usize) -> usize {
        self.text[..offset].rfind('\n').map_or(0, |idx| idx + 1)
    }

    fn line_end(&self, offset: usize) -> usize {
        self.text[offset..]
            .find('\n')
            .map_or(self.text.len(), |idx| offset + idx)
    }
}
