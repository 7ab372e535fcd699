//! Chat-completions client for the hosted model API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::{Auth, HttpClient, HttpError};

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// Backend rejected the request; the message is already displayable.
    #[error("{0}")]
    Api(String),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("model returned an empty reply")]
    EmptyReply,

    #[error("Failed to fetch webpage content for \"{url}\": {reason}")]
    Fetch { url: String, reason: String },
}

impl AiError {
    /// The exact text surfaced in the failure toast.
    pub fn user_message(&self) -> String {
        format!("Sorry, I couldn't process that. Error: {self}")
    }
}

impl From<HttpError> for AiError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Transport(e) => Self::Http(e),
            HttpError::Status { status, body } => {
                Self::Api(format_api_error(&format!("HTTP {status}: {body}")))
            }
            other => Self::Api(other.to_string()),
        }
    }
}

/// Narrow seam to the hosted model. One rendered prompt in, one text
/// completion out.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: Option<f32>) -> Result<String, AiError>;
}

pub struct HttpChatClient {
    http: HttpClient,
    model: String,
}

impl HttpChatClient {
    pub fn new(base_url: &str, api_key: &str, model: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(base_url, Auth::bearer(api_key)),
            model: model.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_content(response: ChatResponse) -> Result<String, AiError> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(AiError::EmptyReply);
    }
    Ok(text.to_string())
}

#[async_trait]
impl ChatApi for HttpChatClient {
    async fn complete(&self, prompt: &str, temperature: Option<f32>) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };
        let response: ChatResponse = self.http.post_json("/chat/completions", &request).await?;
        first_content(response)
    }
}

/// Reduce an API error body to a displayable message. Bodies commonly
/// look like `{"error":{"message":"...","code":"..."}}`; the raw text
/// passes through when nothing recognizable is inside.
pub fn format_api_error(error: &str) -> String {
    let Some(start) = error.find('{') else {
        return error.to_string();
    };
    let (prefix, body) = error.split_at(start);
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return error.to_string();
    };
    let Some(message) = error_message(&json) else {
        return error.to_string();
    };
    let prefix = prefix.trim();
    if prefix.is_empty() {
        message
    } else {
        format!("{prefix} {message}")
    }
}

fn error_message(json: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    if let Some(err) = json.get("error") {
        if let Some(msg) = err.get("message").and_then(Value::as_str) {
            return Some(match err.get("code").and_then(Value::as_str) {
                Some(code) => format!("{msg} (code: {code})"),
                None => msg.to_string(),
            });
        }
        if let Some(msg) = err.as_str() {
            return Some(msg.to_string());
        }
    }
    json.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}
