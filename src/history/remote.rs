//! Sync-service session store with a live snapshot feed.
//!
//! Sessions live in a cloud document collection keyed by an anonymous
//! user identity. The identity is minted on first contact and cached on
//! disk. A background task consumes the service's SSE watch stream and
//! publishes each snapshot through a `watch` channel; until the first
//! snapshot arrives the channel reads `Unavailable`, which is not the
//! same thing as having no sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::session::ChatSession;
use super::store::{SessionFeed, SessionStore, StoreError, StoreProfile, StoreResult};
use crate::http::{Auth, HttpClient, SseParser};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Identity {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

pub struct RemoteStore {
    client: HttpClient,
    identity_path: PathBuf,
    identity: Mutex<Option<String>>,
    reconnect: Duration,
    feed_rx: watch::Receiver<SessionFeed>,
    shutdown: CancellationToken,
}

impl RemoteStore {
    /// Connect to the sync service and start the watch task. The task
    /// runs until [`RemoteStore::disconnect`].
    pub fn connect(base_url: &str, identity_path: PathBuf, reconnect: Duration) -> Arc<Self> {
        let (feed_tx, feed_rx) = watch::channel(SessionFeed::Unavailable);
        let store = Arc::new(Self {
            client: HttpClient::new(base_url, Auth::anonymous()),
            identity_path,
            identity: Mutex::new(None),
            reconnect,
            feed_rx,
            shutdown: CancellationToken::new(),
        });

        let watcher = store.clone();
        tokio::spawn(async move { watcher.watch_sessions(feed_tx).await });

        store
    }

    /// Stop the watch task. Idempotent.
    pub fn disconnect(&self) {
        self.shutdown.cancel();
    }

    /// The anonymous user id, establishing it on first use: cached in
    /// memory, then on disk, then minted from the service.
    async fn user_id(&self) -> StoreResult<String> {
        let mut cached = self.identity.lock().await;
        if let Some(user_id) = cached.as_ref() {
            return Ok(user_id.clone());
        }

        if let Some(identity) = read_identity(&self.identity_path) {
            *cached = Some(identity.user_id.clone());
            return Ok(identity.user_id);
        }

        let identity: Identity = self
            .client
            .post_json("/v1/identities", &serde_json::json!({}))
            .await?;
        debug!("established anonymous identity {}", identity.user_id);
        write_identity(&self.identity_path, &identity);
        *cached = Some(identity.user_id.clone());
        Ok(identity.user_id)
    }

    /// Reconnect loop around one SSE stream at a time. Identity errors
    /// and stream drops both land here and retry after the configured
    /// delay.
    async fn watch_sessions(&self, feed_tx: watch::Sender<SessionFeed>) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }
            if let Err(e) = self.stream_snapshots(&feed_tx).await {
                warn!("session feed interrupted: {e}");
            }
            tokio::select! {
                () = self.shutdown.cancelled() => return,
                () = tokio::time::sleep(self.reconnect) => {}
            }
        }
    }

    async fn stream_snapshots(&self, feed_tx: &watch::Sender<SessionFeed>) -> StoreResult<()> {
        let user_id = self.user_id().await?;
        let path = format!("/v1/users/{user_id}/sessions/watch");
        let mut stream = self.client.get_stream(&path).await?;
        let mut parser = SseParser::new();

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => return Ok(()),
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for event in parser.feed(&String::from_utf8_lossy(&bytes)) {
                            if let Some(snapshot) = parse_snapshot(event.kind.as_deref(), &event.data) {
                                let _ = feed_tx.send(SessionFeed::Snapshot(snapshot));
                            }
                        }
                    }
                    Some(Err(e)) => return Err(StoreError::Http(e)),
                    None => return Ok(()),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for RemoteStore {
    fn profile(&self) -> StoreProfile {
        StoreProfile::REMOTE
    }

    async fn load(&self) -> StoreResult<SessionFeed> {
        let user_id = self.user_id().await?;
        let mut sessions: Vec<ChatSession> = self
            .client
            .get_json(&format!("/v1/users/{user_id}/sessions"))
            .await?;
        sort_newest_first(&mut sessions);
        Ok(SessionFeed::Snapshot(sessions))
    }

    async fn save(&self, sessions: &[ChatSession]) -> StoreResult<()> {
        let user_id = self.user_id().await?;
        self.client
            .put_json(&format!("/v1/users/{user_id}/sessions"), &sessions)
            .await?;
        Ok(())
    }

    async fn create(&self, session: &ChatSession) -> StoreResult<String> {
        let user_id = self.user_id().await?;
        let mut body = session.clone();
        body.user_id = Some(user_id.clone());
        let created: Created = self
            .client
            .post_json(&format!("/v1/users/{user_id}/sessions"), &body)
            .await?;
        Ok(created.id)
    }

    async fn update(&self, session: &ChatSession) -> StoreResult<()> {
        let user_id = self.user_id().await?;
        let mut body = session.clone();
        body.user_id = Some(user_id.clone());
        let path = format!("/v1/users/{user_id}/sessions/{}", session.id);
        match self.client.put_json(&path, &body).await {
            Ok(()) => Ok(()),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {
                debug!("update of absent session {} ignored", session.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, session_id: &str) -> StoreResult<()> {
        let user_id = self.user_id().await?;
        let path = format!("/v1/users/{user_id}/sessions/{session_id}");
        match self.client.delete(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {
                debug!("delete of absent session {session_id} ignored");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn subscribe(&self) -> Option<watch::Receiver<SessionFeed>> {
        Some(self.feed_rx.clone())
    }
}

fn read_identity(path: &Path) -> Option<Identity> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(identity) => Some(identity),
        Err(e) => {
            warn!("discarding unreadable identity file: {e}");
            None
        }
    }
}

/// Best effort; a lost identity file just means a fresh identity next run.
fn write_identity(path: &Path, identity: &Identity) {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(identity).unwrap_or_default();
        std::fs::write(path, json)
    };
    if let Err(e) = write() {
        warn!("failed to persist identity to {}: {e}", path.display());
    }
}

/// Decode a watch event into a session snapshot, newest first. Events
/// other than snapshots and undecodable payloads are dropped with a log.
fn parse_snapshot(kind: Option<&str>, data: &str) -> Option<Vec<ChatSession>> {
    if !matches!(kind, None | Some("snapshot")) {
        return None;
    }
    match serde_json::from_str::<Vec<ChatSession>>(data) {
        Ok(mut sessions) => {
            sort_newest_first(&mut sessions);
            Some(sessions)
        }
        Err(e) => {
            warn!("ignoring malformed session snapshot: {e}");
            None
        }
    }
}

fn sort_newest_first(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_identity_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("identity.json");

        assert!(read_identity(&path).is_none());

        let identity = Identity {
            user_id: "anon-42".to_string(),
        };
        write_identity(&path, &identity);

        let loaded = read_identity(&path).unwrap();
        assert_eq!(loaded.user_id, "anon-42");
    }

    #[test]
    fn test_corrupt_identity_file_is_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(read_identity(&path).is_none());
    }

    #[test]
    fn test_parse_snapshot_sorts_newest_first() {
        let mut older = ChatSession::seeded(Some("u".into()));
        older.created_at -= chrono::Duration::minutes(10);
        let newer = ChatSession::seeded(Some("u".into()));

        let data = serde_json::to_string(&[older.clone(), newer.clone()]).unwrap();
        let parsed = parse_snapshot(Some("snapshot"), &data).unwrap();
        assert_eq!(parsed[0].id, newer.id);
        assert_eq!(parsed[1].id, older.id);
    }

    #[test]
    fn test_parse_snapshot_rejects_other_events_and_garbage() {
        assert!(parse_snapshot(Some("ping"), "[]").is_none());
        assert!(parse_snapshot(Some("snapshot"), "{broken").is_none());
        assert_eq!(parse_snapshot(None, "[]"), Some(Vec::new()));
    }

    #[test]
    fn test_http_status_maps_to_unavailable() {
        let err = StoreError::from(crate::http::HttpError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".into(),
        });
        assert!(matches!(err, StoreError::Unavailable(msg) if msg.contains("500")));
    }
}
