//! Raw webpage retrieval for the summarization flow.

use super::client::AiError;

/// Download the body of `url` as text. The content goes to the model
/// as-is; no markup stripping happens here.
pub async fn fetch_content(client: &reqwest::Client, url: &str) -> Result<String, AiError> {
    let fetch_failed = |reason: String| AiError::Fetch {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_failed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_failed(format!(
            "HTTP error! status: {}",
            status.as_u16()
        )));
    }

    response.text().await.map_err(|e| fetch_failed(e.to_string()))
}
