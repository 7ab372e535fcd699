//! Chat session data model shared by the stores, the cache, and the UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title given to every session until title generation renames it.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Reserved id of the seeded greeting message.
pub const GREETING_ID: &str = "init";

/// Sentinel content for an assistant reply that is still in flight.
/// Renders as a thinking indicator, never as literal text.
pub const PENDING_CONTENT: &str = "...";

const GREETING_TEXT: &str = "Hello! I'm WaleBquit. I can help you generate \
ideas, summarize web pages, and much more. What's on your mind?";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Placeholder appended while a reply is being generated.
    pub fn pending() -> Self {
        Self::new(Role::Assistant, PENDING_CONTENT)
    }

    fn greeting() -> Self {
        Self {
            id: GREETING_ID.to_string(),
            role: Role::Assistant,
            content: GREETING_TEXT.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.content == PENDING_CONTENT
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ChatSession {
    /// New session carrying the seeded greeting. Every session starts
    /// with at least this one message.
    pub fn seeded(user_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            created_at: Utc::now(),
            messages: vec![Message::greeting()],
            user_id,
        }
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Count of user-authored messages, used to detect the first turn.
    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }
}

/// ISO-8601 timestamps with millisecond precision, e.g.
/// `2024-05-01T12:30:15.250Z`. Round-trips to the millisecond.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
