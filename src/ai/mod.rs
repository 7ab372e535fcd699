//! Assistant flows: conversational replies, webpage summarization, and
//! session title generation.
//!
//! Each flow renders a prompt template and sends it through a [`ChatApi`].
//! Routing between conversation and summarization happens on the raw
//! prompt text, so pasting a URL is all it takes to get a summary.

pub mod client;
pub mod webpage;

use std::sync::Arc;

use minijinja::{Environment, context};
use once_cell::sync::Lazy;
use serde::Serialize;
use url::Url;

pub use client::{AiError, ChatApi, HttpChatClient, format_api_error};

use crate::history::{Message, Role};

const REPLY_TEMPLATE: &str = r#"You are WaleBquit, a friendly and highly intelligent AI assistant. Your purpose is to engage in natural, helpful, and well-structured conversations.

Please provide a comprehensive, friendly, and well-structured response to the user's prompt, taking into account the conversation history.
- Your language must be clear, grammatically flawless, and easy to understand.
- Adhere strictly to proper dictionary definitions and sentence structures.
- If a question is complex, break down the answer into smaller, digestible points or steps.
- Maintain a positive and encouraging tone.
- When appropriate, use lists, bold, italics, and other formatting to improve readability.
- If asked who built or created you, you must respond with: "By GOD_OF_ENTITIES".

Here is the conversation history:
{%- for message in history %}
- **{{ message.role }}**: {{ message.content }}
{%- endfor %}

Now, please respond to the latest user prompt:
- **user**: {{ prompt }}"#;

const SUMMARY_TEMPLATE: &str = r#"You are an expert summarizer.  Summarize the content of the webpage below in a concise manner.

Webpage content: {{ content }}"#;

const TITLE_TEMPLATE: &str = r#"Generate a short, concise title (3-5 words) for a chat session that starts with the following user prompt.

User Prompt:
---
{{ prompt }}
---

Title:"#;

/// Lower temperature keeps titles short and on-topic.
const TITLE_TEMPERATURE: f32 = 0.3;

static TEMPLATES: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.add_template("reply", REPLY_TEMPLATE)
        .expect("valid template");
    env.add_template("summary", SUMMARY_TEMPLATE)
        .expect("valid template");
    env.add_template("title", TITLE_TEMPLATE)
        .expect("valid template");
    env
});

#[derive(Serialize)]
struct HistoryTurn<'a> {
    role: &'static str,
    content: &'a str,
}

pub struct AiService {
    api: Arc<dyn ChatApi>,
    fetcher: reqwest::Client,
}

impl AiService {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        let fetcher = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { api, fetcher }
    }

    /// Answer one submission. URLs are summarized, everything else gets a
    /// conversational reply against `history`.
    pub async fn respond(&self, prompt: &str, history: &[Message]) -> Result<String, AiError> {
        let trimmed = prompt.trim();
        if looks_like_url(trimmed) {
            self.summarize_url(trimmed).await
        } else {
            self.generate_reply(trimmed, history).await
        }
    }

    pub async fn generate_reply(
        &self,
        prompt: &str,
        history: &[Message],
    ) -> Result<String, AiError> {
        let rendered = render_reply_prompt(prompt, history)?;
        self.api.complete(&rendered, None).await
    }

    pub async fn summarize_url(&self, url: &str) -> Result<String, AiError> {
        let content = webpage::fetch_content(&self.fetcher, url).await?;
        let rendered = TEMPLATES
            .get_template("summary")?
            .render(context! { content => content })?;
        self.api.complete(&rendered, None).await
    }

    /// Short title for a session from its opening prompt. The result is
    /// scrubbed of quoting the model tends to add.
    pub async fn generate_title(&self, prompt: &str) -> Result<String, AiError> {
        let rendered = TEMPLATES
            .get_template("title")?
            .render(context! { prompt => prompt })?;
        let raw = self.api.complete(&rendered, Some(TITLE_TEMPERATURE)).await?;
        Ok(clean_title(&raw))
    }
}

fn render_reply_prompt(prompt: &str, history: &[Message]) -> Result<String, AiError> {
    let turns: Vec<HistoryTurn> = history
        .iter()
        .map(|m| HistoryTurn {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect();
    let rendered = TEMPLATES
        .get_template("reply")?
        .render(context! { history => turns, prompt => prompt })?;
    Ok(rendered)
}

/// A prompt counts as a URL when it parses as an absolute URL, contains a
/// dot, and is not the degenerate `scheme://.` form.
pub fn looks_like_url(text: &str) -> bool {
    if text.starts_with("http://.") || text.starts_with("https://.") {
        return false;
    }
    Url::parse(text).is_ok() && text.contains('.')
}

fn clean_title(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}
