//! Session store contract and the background write queue.
//!
//! Stores persist the session list durably. Mutations never wait on them:
//! the cache is updated synchronously and the durable write is dispatched
//! to an ordered queue drained by a background task. Write failures are
//! logged and never surfaced to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use super::session::ChatSession;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<crate::http::HttpError> for StoreError {
    fn from(e: crate::http::HttpError) -> Self {
        use crate::http::HttpError;
        match e {
            HttpError::Transport(e) => Self::Http(e),
            HttpError::Status { status, body } => {
                Self::Unavailable(format!("HTTP {status}: {body}"))
            }
            HttpError::Decode(msg) => Self::InvalidData(msg),
            HttpError::InvalidCredential => {
                Self::InvalidData("credential contains invalid header characters".into())
            }
        }
    }
}

/// One emission of the session collection from a store.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionFeed {
    /// Full session list, newest first. May be empty.
    Snapshot(Vec<ChatSession>),
    /// The store cannot produce a list yet (identity not established,
    /// live stream not connected). Distinct from an empty snapshot.
    Unavailable,
}

/// Behavior bundle a store declares up front, so variant policy lives at
/// the store seam instead of branching deep in the cache logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreProfile {
    /// Message-touching mutations move the session to the front of the
    /// in-memory list (most-recently-active-first ordering).
    pub float_on_touch: bool,
    /// Deleting the last session immediately seeds a replacement.
    pub reseed_on_empty: bool,
    /// Persist by replacing the whole list; otherwise per-document writes.
    pub whole_list_writes: bool,
}

impl StoreProfile {
    pub const LOCAL: Self = Self {
        float_on_touch: true,
        reseed_on_empty: true,
        whole_list_writes: true,
    };

    pub const REMOTE: Self = Self {
        float_on_touch: false,
        reseed_on_empty: false,
        whole_list_writes: false,
    };
}

/// Durable home of the session list. Implementations must tolerate writes
/// addressed to absent documents (treated as no-ops, not errors).
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn profile(&self) -> StoreProfile;

    /// One-time startup read. Missing or malformed local data yields an
    /// empty snapshot, never an error.
    async fn load(&self) -> StoreResult<SessionFeed>;

    /// Replace the persisted list wholesale.
    async fn save(&self, sessions: &[ChatSession]) -> StoreResult<()>;

    /// Create a durable record, returning its permanent id. Local stores
    /// echo the client-synthesized id.
    async fn create(&self, session: &ChatSession) -> StoreResult<String>;

    async fn update(&self, session: &ChatSession) -> StoreResult<()>;

    async fn delete(&self, session_id: &str) -> StoreResult<()>;

    /// Live snapshot feed, if this store has one. Holds
    /// `SessionFeed::Unavailable` until the first snapshot arrives.
    fn subscribe(&self) -> Option<watch::Receiver<SessionFeed>>;
}

/// A durable write dispatched by a mutator.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Replace(Vec<ChatSession>),
    Create(ChatSession),
    Update(ChatSession),
    Delete(String),
}

/// Permanent id granted by the store for a provisionally-identified create.
#[derive(Debug, Clone)]
pub struct CreateAck {
    pub provisional_id: String,
    pub durable_id: String,
}

/// Handle to the ordered fire-and-forget writer task.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteQueue {
    /// Spawn the writer task for `store`. The returned receiver delivers
    /// create acks for provisional-id reconciliation.
    pub fn spawn(store: Arc<dyn SessionStore>) -> (Self, mpsc::UnboundedReceiver<CreateAck>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(store, rx, ack_tx));
        (Self { tx }, ack_rx)
    }

    pub fn dispatch(&self, op: WriteOp) {
        if self.tx.send(op).is_err() {
            warn!("write queue closed; dropping durable write");
        }
    }
}

/// Single consumer keeps writes strictly ordered. Ops that trail an acked
/// create are rewritten from the provisional id to the permanent one, so a
/// rename or delete issued during the provisional window lands on the
/// right document.
async fn drain(
    store: Arc<dyn SessionStore>,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
    ack_tx: mpsc::UnboundedSender<CreateAck>,
) {
    let mut durable_ids: HashMap<String, String> = HashMap::new();

    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Replace(sessions) => {
                if let Err(e) = store.save(&sessions).await {
                    warn!("failed to save session list: {e}");
                }
            }
            WriteOp::Create(session) => {
                let provisional_id = session.id.clone();
                match store.create(&session).await {
                    Ok(durable_id) => {
                        if durable_id != provisional_id {
                            durable_ids.insert(provisional_id.clone(), durable_id.clone());
                        }
                        let _ = ack_tx.send(CreateAck {
                            provisional_id,
                            durable_id,
                        });
                    }
                    Err(e) => warn!("failed to create session {provisional_id}: {e}"),
                }
            }
            WriteOp::Update(mut session) => {
                if let Some(durable_id) = durable_ids.get(&session.id) {
                    session.id = durable_id.clone();
                }
                if let Err(e) = store.update(&session).await {
                    warn!("failed to update session {}: {e}", session.id);
                }
            }
            WriteOp::Delete(mut session_id) => {
                if let Some(durable_id) = durable_ids.remove(&session_id) {
                    session_id = durable_id;
                }
                if let Err(e) = store.delete(&session_id).await {
                    warn!("failed to delete session {session_id}: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Store that logs every call and mints server-style ids for creates.
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
        fail_creates: bool,
    }

    impl RecordingStore {
        fn new(fail_creates: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_creates,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionStore for RecordingStore {
        fn profile(&self) -> StoreProfile {
            StoreProfile::REMOTE
        }

        async fn load(&self) -> StoreResult<SessionFeed> {
            Ok(SessionFeed::Snapshot(Vec::new()))
        }

        async fn save(&self, sessions: &[ChatSession]) -> StoreResult<()> {
            self.calls.lock().unwrap().push(format!("save:{}", sessions.len()));
            Ok(())
        }

        async fn create(&self, session: &ChatSession) -> StoreResult<String> {
            if self.fail_creates {
                self.calls.lock().unwrap().push(format!("create-failed:{}", session.id));
                return Err(StoreError::Unavailable("offline".into()));
            }
            let durable = format!("srv-{}", session.id);
            self.calls.lock().unwrap().push(format!("create:{}", session.id));
            Ok(durable)
        }

        async fn update(&self, session: &ChatSession) -> StoreResult<()> {
            self.calls.lock().unwrap().push(format!("update:{}", session.id));
            Ok(())
        }

        async fn delete(&self, session_id: &str) -> StoreResult<()> {
            self.calls.lock().unwrap().push(format!("delete:{session_id}"));
            Ok(())
        }

        fn subscribe(&self) -> Option<watch::Receiver<SessionFeed>> {
            None
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[tokio::test]
    async fn test_writes_drain_in_dispatch_order() {
        let store = RecordingStore::new(false);
        let (queue, _acks) = WriteQueue::spawn(store.clone());

        let session = ChatSession::seeded(None);
        queue.dispatch(WriteOp::Update(session.clone()));
        queue.dispatch(WriteOp::Delete(session.id.clone()));
        queue.dispatch(WriteOp::Replace(vec![session.clone()]));

        wait_until(|| store.calls().len() == 3).await;
        assert_eq!(
            store.calls(),
            vec![
                format!("update:{}", session.id),
                format!("delete:{}", session.id),
                "save:1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_ack_carries_durable_id() {
        let store = RecordingStore::new(false);
        let (queue, mut acks) = WriteQueue::spawn(store.clone());

        let session = ChatSession::seeded(None);
        queue.dispatch(WriteOp::Create(session.clone()));

        let ack = acks.recv().await.unwrap();
        assert_eq!(ack.provisional_id, session.id);
        assert_eq!(ack.durable_id, format!("srv-{}", session.id));
    }

    #[tokio::test]
    async fn test_trailing_ops_rewritten_to_durable_id() {
        let store = RecordingStore::new(false);
        let (queue, _acks) = WriteQueue::spawn(store.clone());

        let session = ChatSession::seeded(None);
        let provisional = session.id.clone();
        queue.dispatch(WriteOp::Create(session.clone()));
        queue.dispatch(WriteOp::Update(session.clone()));
        queue.dispatch(WriteOp::Delete(provisional.clone()));

        wait_until(|| store.calls().len() == 3).await;
        assert_eq!(
            store.calls(),
            vec![
                format!("create:{provisional}"),
                format!("update:srv-{provisional}"),
                format!("delete:srv-{provisional}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stall_the_queue() {
        let store = RecordingStore::new(true);
        let (queue, _acks) = WriteQueue::spawn(store.clone());

        let session = ChatSession::seeded(None);
        queue.dispatch(WriteOp::Create(session.clone()));
        queue.dispatch(WriteOp::Update(session.clone()));

        wait_until(|| store.calls().len() == 2).await;
        // Create failed, so no id mapping exists and the update keeps the
        // provisional id.
        assert_eq!(
            store.calls(),
            vec![
                format!("create-failed:{}", session.id),
                format!("update:{}", session.id),
            ]
        );
    }
}
