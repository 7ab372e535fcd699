//! Chat pane rendering: the active session's messages as styled lines.

use std::borrow::Cow;

use crossterm::style::Color;

use crate::history::{ChatSession, Message, Role};

use super::Typewriter;
use super::markdown::render_markdown;
use super::text::{LineBuilder, StyledLine, StyledSpan, wrap_line, wrap_spans};

/// Animated indicator for a reply that is still in flight.
pub fn thinking_frame(frame: u64) -> &'static str {
    match (frame / 4) % 3 {
        0 => "·",
        1 => "··",
        _ => "···",
    }
}

/// Content to display for a message, truncated while a typewriter reveal
/// is running for it. The cache always holds the full text.
fn display_content<'a>(
    message: &'a Message,
    session_id: &str,
    typewriter: Option<&Typewriter>,
) -> Cow<'a, str> {
    if let Some(tw) = typewriter
        && tw.session_id == session_id
        && tw.message_id == message.id
        && tw.shown < tw.total
    {
        let partial: String = message.content.chars().take(tw.shown).collect();
        return partial.into();
    }
    Cow::Borrowed(&message.content)
}

pub fn build_chat_lines(
    session: &ChatSession,
    width: usize,
    frame: u64,
    typewriter: Option<&Typewriter>,
) -> Vec<StyledLine> {
    let width = width.max(4);
    let mut lines = Vec::new();

    for message in &session.messages {
        match message.role {
            Role::User => {
                let available = width.saturating_sub(2).max(1);
                for raw in message.content.lines() {
                    for chunk in wrap_line(raw, available) {
                        lines.push(
                            LineBuilder::new()
                                .styled(StyledSpan::colored("> ", Color::Cyan).with_dim())
                                .styled(StyledSpan::colored(chunk, Color::Cyan).with_dim())
                                .build(),
                        );
                    }
                }
            }
            Role::Assistant if message.is_pending() => {
                lines.push(StyledLine::dim(format!(" {}", thinking_frame(frame))));
            }
            Role::Assistant => {
                let content = display_content(message, &session.id, typewriter);
                for line in render_markdown(&content, width.saturating_sub(1)) {
                    let mut padded = StyledLine::new(vec![StyledSpan::raw(" ")]);
                    padded.spans.extend(line.spans);
                    lines.extend(wrap_spans(&padded, width));
                }
            }
        }
        lines.push(StyledLine::empty());
    }

    while lines.last().is_some_and(StyledLine::is_empty) {
        lines.pop();
    }

    lines
}
