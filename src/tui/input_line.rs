//! Single-line input state: a string with a character-indexed cursor.
//!
//! The cursor is a char index, not a byte offset, but movement and
//! deletion step over grapheme clusters so combining sequences edit as
//! single units.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Default)]
pub struct InputState {
    text: String,
    cursor: usize,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when the input holds nothing submittable.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Convert a char index to a byte offset.
    fn char_to_byte(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map_or(self.text.len(), |(byte_idx, _)| byte_idx)
    }

    /// Char length of the grapheme cluster ending at the cursor.
    fn grapheme_before(&self) -> usize {
        let byte = self.char_to_byte(self.cursor);
        self.text[..byte]
            .graphemes(true)
            .next_back()
            .map_or(0, |g| g.chars().count())
    }

    /// Char length of the grapheme cluster starting at the cursor.
    fn grapheme_after(&self) -> usize {
        let byte = self.char_to_byte(self.cursor);
        self.text[byte..]
            .graphemes(true)
            .next()
            .map_or(0, |g| g.chars().count())
    }

    pub fn insert_char(&mut self, c: char) {
        let byte = self.char_to_byte(self.cursor);
        self.text.insert(byte, c);
        self.cursor += 1;
    }

    pub fn delete_char_before(&mut self) {
        let len = self.grapheme_before();
        if len == 0 {
            return;
        }
        let to = self.char_to_byte(self.cursor);
        self.cursor -= len;
        let from = self.char_to_byte(self.cursor);
        self.text.drain(from..to);
    }

    pub fn delete_char_after(&mut self) {
        let len = self.grapheme_after();
        if len == 0 {
            return;
        }
        let from = self.char_to_byte(self.cursor);
        let to = self.char_to_byte(self.cursor + len);
        self.text.drain(from..to);
    }

    /// Delete the word before the cursor, plus any whitespace between
    /// them.
    pub fn delete_word_before(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let chars: Vec<char> = self.text.chars().collect();
        let mut start = self.cursor;
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !chars[start - 1].is_whitespace() {
            start -= 1;
        }
        let from = self.char_to_byte(start);
        let to = self.char_to_byte(self.cursor);
        self.text.drain(from..to);
        self.cursor = start;
    }

    pub fn delete_to_start(&mut self) {
        let to = self.char_to_byte(self.cursor);
        self.text.drain(..to);
        self.cursor = 0;
    }

    pub fn delete_to_end(&mut self) {
        let from = self.char_to_byte(self.cursor);
        self.text.truncate(from);
    }

    pub fn move_left(&mut self) {
        self.cursor -= self.grapheme_before();
    }

    pub fn move_right(&mut self) {
        self.cursor += self.grapheme_after();
    }

    pub fn move_to_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_to_end(&mut self) {
        self.cursor = self.char_count();
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.char_count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Take the text out, leaving the input empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    /// Slice of the text that fits in `width` columns with the cursor
    /// visible, plus the cursor's column within that slice.
    pub fn visible_window(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }
        let start = if self.cursor < width {
            0
        } else {
            self.cursor + 1 - width
        };
        let visible: String = self.text.chars().skip(start).take(width).collect();
        (visible, self.cursor - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete() {
        let mut input = InputState::new();
        input.insert_char('h');
        input.insert_char('i');
        assert_eq!(input.text(), "hi");
        assert_eq!(input.cursor(), 2);

        input.delete_char_before();
        assert_eq!(input.text(), "h");
        assert_eq!(input.cursor(), 1);

        // Deleting at the start is a no-op.
        input.move_to_start();
        input.delete_char_before();
        assert_eq!(input.text(), "h");
    }

    #[test]
    fn test_unicode_editing() {
        let mut input = InputState::new();
        for c in "héllo".chars() {
            input.insert_char(c);
        }
        input.move_left();
        input.move_left();
        input.insert_char('!');
        assert_eq!(input.text(), "hél!lo");

        input.delete_char_before();
        assert_eq!(input.text(), "héllo");
        assert_eq!(input.cursor(), 3);
    }

    #[test]
    fn test_backspace_removes_whole_grapheme() {
        let mut input = InputState::new();
        // "e" followed by a combining acute accent is one cluster.
        input.set_text("cafe\u{301}");
        assert_eq!(input.cursor(), 5);

        input.delete_char_before();
        assert_eq!(input.text(), "caf");
        assert_eq!(input.cursor(), 3);
    }

    #[test]
    fn test_cursor_steps_over_grapheme_clusters() {
        let mut input = InputState::new();
        input.set_text("e\u{301}x");
        assert_eq!(input.cursor(), 3);

        input.move_left();
        assert_eq!(input.cursor(), 2);
        input.move_left();
        assert_eq!(input.cursor(), 0);

        input.move_right();
        assert_eq!(input.cursor(), 2);
    }

    #[test]
    fn test_delete_char_after() {
        let mut input = InputState::new();
        input.set_text("abc");
        input.move_to_start();
        input.delete_char_after();
        assert_eq!(input.text(), "bc");

        input.move_to_end();
        input.delete_char_after();
        assert_eq!(input.text(), "bc");
    }

    #[test]
    fn test_delete_word_before() {
        let mut input = InputState::new();
        input.set_text("one two three");
        input.delete_word_before();
        assert_eq!(input.text(), "one two ");

        input.delete_word_before();
        assert_eq!(input.text(), "one ");
        assert_eq!(input.cursor(), 4);
    }

    #[test]
    fn test_kill_line_left_and_right() {
        let mut input = InputState::new();
        input.set_text("hello world");
        input.move_to_start();
        for _ in 0..5 {
            input.move_right();
        }

        let mut right = InputState::new();
        right.set_text("hello world");
        right.move_to_start();
        for _ in 0..5 {
            right.move_right();
        }
        right.delete_to_end();
        assert_eq!(right.text(), "hello");

        input.delete_to_start();
        assert_eq!(input.text(), " world");
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn test_set_text_places_cursor_at_end() {
        let mut input = InputState::new();
        input.set_text("héllo");
        assert_eq!(input.cursor(), 5);
    }

    #[test]
    fn test_take_resets() {
        let mut input = InputState::new();
        input.set_text("draft");
        assert_eq!(input.take(), "draft");
        assert!(input.is_empty());
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn test_blank_detection() {
        let mut input = InputState::new();
        assert!(input.is_blank());
        input.set_text("   ");
        assert!(input.is_blank());
        input.set_text(" x ");
        assert!(!input.is_blank());
    }

    #[test]
    fn test_visible_window_scrolls_to_cursor() {
        let mut input = InputState::new();
        input.set_text("abcdefghij");

        // Cursor at end, window of 5 shows the tail with a free
        // column for the cursor itself.
        let (text, col) = input.visible_window(5);
        assert_eq!(text, "ghij");
        assert_eq!(col, 4);

        input.move_to_start();
        let (text, col) = input.visible_window(5);
        assert_eq!(text, "abcde");
        assert_eq!(col, 0);
    }
}
