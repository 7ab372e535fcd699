//! Incremental parser for `text/event-stream` payloads.
//!
//! The sync service pushes session snapshots over SSE. Network chunks can
//! split anywhere, so the parser buffers until the blank-line delimiter
//! completes an event.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if the server named the event.
    pub kind: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    pending: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every event it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        // CR is legal in the wire format; normalize it away up front.
        if chunk.contains('\r') {
            self.pending.push_str(&chunk.replace('\r', ""));
        } else {
            self.pending.push_str(chunk);
        }

        let mut events = Vec::new();
        while let Some(end) = self.pending.find("\n\n") {
            let block: String = self.pending.drain(..end + 2).collect();
            if let Some(event) = parse_block(&block) {
                events.push(event);
            }
        }
        events
    }

    /// Drop any partially received event, e.g. when reconnecting.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Parse one delimiter-terminated block. Field syntax per the SSE spec:
/// `name: value` with at most one space stripped after the colon; lines
/// starting with `:` are comments; repeated `data` fields join with
/// newlines. Blocks without data produce nothing.
fn parse_block(block: &str) -> Option<SseEvent> {
    let mut kind = None;
    let mut data: Option<String> = None;

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => kind = Some(value.to_string()),
            "data" => match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    data.map(|data| SseEvent { kind, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
        assert!(events[0].kind.is_none());
    }

    #[test]
    fn test_named_snapshot_event() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: snapshot\ndata: [{\"id\":\"a\"}]\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.as_deref(), Some("snapshot"));
        assert_eq!(events[0].data, "[{\"id\":\"a\"}]");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: snap").is_empty());
        assert!(parser.feed("shot\ndata: [").is_empty());
        let events = parser.feed("]\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.as_deref(), Some("snapshot"));
        assert_eq!(events[0].data, "[]");
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: one\n\ndata: two\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one");
        assert_eq!(events[1].data, "two");
    }

    #[test]
    fn test_multiline_data_joined_with_newlines() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: [\ndata: ]\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[\n]");
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let mut parser = SseParser::new();
        let events = parser.feed(": keepalive\nretry: 3000\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_block_without_data_produces_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.feed(": keepalive\n\n").is_empty());
        assert!(parser.feed("event: snapshot\n\n").is_empty());
    }

    #[test]
    fn test_crlf_delimiters() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: snapshot\r\ndata: []\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[]");
    }

    #[test]
    fn test_bare_data_field_is_empty_string() {
        let mut parser = SseParser::new();
        let events = parser.feed("data\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn test_only_first_space_after_colon_stripped() {
        let mut parser = SseParser::new();
        let events = parser.feed("data:  spaced\n\n");
        assert_eq!(events[0].data, " spaced");
    }

    #[test]
    fn test_reset_discards_partial_event() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: partial").is_empty());
        parser.reset();
        let events = parser.feed("data: fresh\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "fresh");
    }
}
