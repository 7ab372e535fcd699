//! Styled text primitives for direct crossterm rendering.
//!
//! Spans carry a `ContentStyle`, lines carry spans, and the frame
//! renderer writes them row by row. Wrapping is character-count based;
//! width measurement for truncation uses display width.

use crossterm::style::{Attribute, Color, ContentStyle, StyledContent};
use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

/// A styled span of text.
#[derive(Clone, Debug)]
pub struct StyledSpan {
    pub content: String,
    pub style: ContentStyle,
}

impl StyledSpan {
    pub fn new(content: impl Into<String>, style: ContentStyle) -> Self {
        Self {
            content: content.into(),
            style,
        }
    }

    /// Create an unstyled span.
    pub fn raw(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            style: ContentStyle::new(),
        }
    }

    /// Create a span with foreground color.
    pub fn colored(content: impl Into<String>, color: Color) -> Self {
        Self {
            content: content.into(),
            style: ContentStyle {
                foreground_color: Some(color),
                ..ContentStyle::default()
            },
        }
    }

    /// Create a dim span.
    pub fn dim(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            style: ContentStyle {
                attributes: Attribute::Dim.into(),
                ..ContentStyle::default()
            },
        }
    }

    /// Create a bold span.
    pub fn bold(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            style: ContentStyle {
                attributes: Attribute::Bold.into(),
                ..ContentStyle::default()
            },
        }
    }

    /// Create an italic span.
    pub fn italic(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            style: ContentStyle {
                attributes: Attribute::Italic.into(),
                ..ContentStyle::default()
            },
        }
    }

    pub fn with_italic(mut self) -> Self {
        self.style.attributes.set(Attribute::Italic);
        self
    }

    pub fn with_dim(mut self) -> Self {
        self.style.attributes.set(Attribute::Dim);
        self
    }

    pub fn with_reverse(mut self) -> Self {
        self.style.attributes.set(Attribute::Reverse);
        self
    }

    /// Write this span to a writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let styled = StyledContent::new(self.style, &self.content);
        write!(w, "{styled}")
    }
}

/// A line of styled text.
#[derive(Clone, Debug, Default)]
pub struct StyledLine {
    pub spans: Vec<StyledSpan>,
}

impl StyledLine {
    pub fn new(spans: Vec<StyledSpan>) -> Self {
        Self { spans }
    }

    pub fn empty() -> Self {
        Self { spans: Vec::new() }
    }

    /// Create a line from a single raw string.
    pub fn raw(content: impl Into<String>) -> Self {
        Self {
            spans: vec![StyledSpan::raw(content)],
        }
    }

    /// Create a line from a single dim string.
    pub fn dim(content: impl Into<String>) -> Self {
        Self {
            spans: vec![StyledSpan::dim(content)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.content.is_empty())
    }

    pub fn push(&mut self, span: StyledSpan) {
        self.spans.push(span);
    }

    /// Display width of the line.
    pub fn width(&self) -> usize {
        self.spans.iter().map(|s| s.content.width()).sum()
    }

    /// Write this line to a writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for span in &self.spans {
            span.write_to(w)?;
        }
        Ok(())
    }
}

/// Builder for creating styled lines.
pub struct LineBuilder {
    line: StyledLine,
}

impl LineBuilder {
    pub fn new() -> Self {
        Self {
            line: StyledLine::empty(),
        }
    }

    pub fn raw(mut self, content: impl Into<String>) -> Self {
        self.line.push(StyledSpan::raw(content));
        self
    }

    pub fn colored(mut self, content: impl Into<String>, color: Color) -> Self {
        self.line.push(StyledSpan::colored(content, color));
        self
    }

    pub fn dim(mut self, content: impl Into<String>) -> Self {
        self.line.push(StyledSpan::dim(content));
        self
    }

    pub fn bold(mut self, content: impl Into<String>) -> Self {
        self.line.push(StyledSpan::bold(content));
        self
    }

    pub fn styled(mut self, span: StyledSpan) -> Self {
        self.line.push(span);
        self
    }

    pub fn build(self) -> StyledLine {
        self.line
    }
}

impl Default for LineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hard-wrap plain text into chunks of at most `width` characters.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![String::new()];
    }
    if line.is_empty() {
        return vec![String::new()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for ch in line.chars() {
        current.push(ch);
        current_len += 1;
        if current_len >= width {
            chunks.push(current);
            current = String::new();
            current_len = 0;
        }
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Hard-wrap a styled line into lines of at most `width` characters,
/// preserving each chunk's style.
pub fn wrap_spans(line: &StyledLine, width: usize) -> Vec<StyledLine> {
    if width == 0 {
        return vec![StyledLine::empty()];
    }

    let mut out = Vec::new();
    let mut current = StyledLine::empty();
    let mut current_len = 0usize;

    for span in &line.spans {
        let mut buffer = String::new();
        for ch in span.content.chars() {
            buffer.push(ch);
            current_len += 1;
            if current_len >= width {
                current.push(StyledSpan::new(std::mem::take(&mut buffer), span.style));
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
        }
        if !buffer.is_empty() {
            current.push(StyledSpan::new(buffer, span.style));
        }
    }

    if !current.spans.is_empty() || out.is_empty() {
        out.push(current);
    }

    out
}

/// Truncate text to `max_width` display columns, appending an ellipsis
/// when anything was cut.
pub fn truncate_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > max_width.saturating_sub(1) {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_builder() {
        let line = LineBuilder::new()
            .raw("prefix: ")
            .colored("colored", Color::Blue)
            .dim(" (dim)")
            .build();
        assert_eq!(line.spans.len(), 3);
        assert!(!line.is_empty());
        assert_eq!(line.width(), "prefix: colored (dim)".len());
    }

    #[test]
    fn test_wrap_line_boundaries() {
        assert_eq!(wrap_line("", 10), vec![String::new()]);
        assert_eq!(wrap_line("short", 10), vec!["short".to_string()]);
        assert_eq!(
            wrap_line("abcdefghij", 4),
            vec!["abcd".to_string(), "efgh".to_string(), "ij".to_string()]
        );
        assert_eq!(wrap_line("abcd", 4), vec!["abcd".to_string()]);
    }

    #[test]
    fn test_wrap_spans_preserves_styles() {
        let line = LineBuilder::new().bold("abc").raw("defg").build();
        let wrapped = wrap_spans(&line, 4);

        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[0].spans[0].content, "abc");
        assert_eq!(wrapped[0].spans[1].content, "d");
        assert_eq!(wrapped[1].spans[0].content, "efg");
        assert!(wrapped[0].spans[0].style.attributes.has(Attribute::Bold));
        assert!(!wrapped[1].spans[0].style.attributes.has(Attribute::Bold));
    }

    #[test]
    fn test_wrap_spans_empty_line() {
        let wrapped = wrap_spans(&StyledLine::empty(), 10);
        assert_eq!(wrapped.len(), 1);
        assert!(wrapped[0].is_empty());
    }

    #[test]
    fn test_truncate_width() {
        assert_eq!(truncate_width("hello", 10), "hello");
        assert_eq!(truncate_width("hello world", 8), "hello w…");
        assert_eq!(truncate_width("日本語テキスト", 7), "日本語…");
    }
}
