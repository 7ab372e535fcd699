//! Thin `reqwest` wrapper with a base URL and optional bearer auth.

use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};

/// Request timeout.
const TIMEOUT: Duration = Duration::from_secs(120);
/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Non-success response. The status survives so callers can treat
    /// specific codes (a 404 on a document write) as no-ops.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("credential contains invalid header characters")]
    InvalidCredential,

    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Bearer credential, or nothing for anonymous services.
#[derive(Clone)]
pub struct Auth(Option<String>);

impl Auth {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => f.debug_tuple("Auth").field(&"[REDACTED]").finish(),
            None => f.debug_tuple("Auth").field(&"anonymous").finish(),
        }
    }
}

#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    auth: Auth,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Self {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            client,
            base_url,
            auth,
        }
    }

    fn headers(&self) -> Result<HeaderMap, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.auth.0 {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HttpError::InvalidCredential)?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, HttpError> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.headers()?)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, HttpError> {
        let response = self
            .client
            .post(self.url(path))
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn put_json<T: Serialize>(&self, path: &str, body: &T) -> Result<(), HttpError> {
        let response = self
            .client
            .put(self.url(path))
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;
        check(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), HttpError> {
        let response = self
            .client
            .delete(self.url(path))
            .headers(self.headers()?)
            .send()
            .await?;
        check(response).await
    }

    /// GET returning the raw byte stream, with `Accept: text/event-stream`.
    pub async fn get_stream(
        &self,
        path: &str,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>> + use<>, HttpError> {
        let mut headers = self.headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let response = self
            .client
            .get(self.url(path))
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status { status, body });
        }

        Ok(response.bytes_stream())
    }
}

async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, HttpError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(HttpError::Status { status, body: text });
    }
    serde_json::from_str(&text).map_err(|e| HttpError::Decode(format!("{e}; body: {text}")))
}

async fn check(response: reqwest::Response) -> Result<(), HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(HttpError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let client = HttpClient::new("https://api.example.com", Auth::bearer("secret"));
        let headers = client.headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
    }

    #[test]
    fn test_anonymous_has_no_auth_header() {
        let client = HttpClient::new("https://api.example.com", Auth::anonymous());
        let headers = client.headers().unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = HttpClient::new("https://api.example.com/v1/", Auth::anonymous());
        assert_eq!(
            client.url("/sessions"),
            "https://api.example.com/v1/sessions"
        );
    }

    #[test]
    fn test_auth_debug_is_redacted() {
        let auth = Auth::bearer("very-secret-token");
        assert!(!format!("{auth:?}").contains("very-secret-token"));
    }
}
