//! Client-side chat history: an optimistic in-memory session cache over a
//! durable store.
//!
//! Mutators update the cache synchronously and enqueue durable writes that
//! are never awaited, so the UI observes every change immediately. Stores
//! with a live feed push whole snapshots that replace the cache through one
//! merge path; the feed wins over lingering optimistic state, except for
//! sessions whose create has not been acked yet.

mod local;
mod remote;
mod session;
mod store;


pub use local::LocalStore;
pub use remote::RemoteStore;
pub use session::{ChatSession, DEFAULT_TITLE, GREETING_ID, Message, PENDING_CONTENT, Role};
pub use store::{
    CreateAck, SessionFeed, SessionStore, StoreError, StoreProfile, StoreResult, WriteOp,
    WriteQueue,
};

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Selector state the UI renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryState {
    /// Startup read or identity bootstrap still pending.
    Loading,
    /// Store is ready but holds no sessions.
    NoSession,
    /// The active session id. Always references a cached session.
    Active(String),
}

pub struct ChatHistory {
    store: Arc<dyn SessionStore>,
    profile: StoreProfile,
    queue: WriteQueue,
    acks: mpsc::UnboundedReceiver<CreateAck>,
    feed: Option<watch::Receiver<SessionFeed>>,
    sessions: Vec<ChatSession>,
    active_id: Option<String>,
    loaded: bool,
    /// Provisional ids whose create has been dispatched but not acked.
    pending_creates: HashSet<String>,
}

impl ChatHistory {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let profile = store.profile();
        let (queue, acks) = WriteQueue::spawn(store.clone());
        let feed = store.subscribe();
        Self {
            store,
            profile,
            queue,
            acks,
            feed,
            sessions: Vec::new(),
            active_id: None,
            loaded: false,
            pending_creates: HashSet::new(),
        }
    }

    /// One-time startup read for stores without a live feed. Feed-backed
    /// stores become ready when their first snapshot arrives via [`pump`].
    /// An unreadable store logs and proceeds with a fresh empty set.
    ///
    /// [`pump`]: ChatHistory::pump
    pub async fn start(&mut self) {
        if self.feed.is_some() || self.loaded {
            return;
        }
        match self.store.load().await {
            Ok(SessionFeed::Snapshot(sessions)) => self.install_snapshot(sessions),
            Ok(SessionFeed::Unavailable) => {}
            Err(e) => {
                warn!("failed to load chat history, starting fresh: {e}");
                self.install_snapshot(Vec::new());
            }
        }
    }

    /// Drain create acks, then absorb a new feed snapshot if one arrived.
    /// Acks drain first so provisional ids are renamed before a snapshot
    /// that already carries their permanent ids is merged. Returns true
    /// when the cache changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(ack) = self.acks.try_recv() {
            changed |= self.apply_ack(&ack);
        }
        if let Some(feed) = &mut self.feed
            && feed.has_changed().unwrap_or(false)
        {
            let value = feed.borrow_and_update().clone();
            if let SessionFeed::Snapshot(snapshot) = value {
                self.install_snapshot(snapshot);
                changed = true;
            }
        }
        changed
    }

    pub fn state(&self) -> HistoryState {
        if !self.loaded {
            return HistoryState::Loading;
        }
        match &self.active_id {
            Some(id) => HistoryState::Active(id.clone()),
            None => HistoryState::NoSession,
        }
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn session(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        self.active_id.as_ref().and_then(|id| self.session(id))
    }

    /// Explicit selection. Unknown ids are ignored.
    pub fn set_active_session(&mut self, session_id: &str) {
        if self.sessions.iter().any(|s| s.id == session_id) {
            self.active_id = Some(session_id.to_string());
        }
    }

    /// Create, select, and persist a fresh seeded session. The returned id
    /// is provisional until the store acks the create; the session is
    /// usable under it immediately.
    pub fn start_new_session(&mut self) -> String {
        let session = ChatSession::seeded(None);
        let id = session.id.clone();
        self.sessions.insert(0, session.clone());
        self.active_id = Some(id.clone());
        if self.profile.whole_list_writes {
            self.queue.dispatch(WriteOp::Replace(self.sessions.clone()));
        } else {
            self.pending_creates.insert(id.clone());
            self.queue.dispatch(WriteOp::Create(session));
        }
        id
    }

    /// Append a message. Absent targets are a silent no-op.
    pub fn add_message(&mut self, session_id: &str, message: Message) {
        let Some(pos) = self.position(session_id) else {
            return;
        };
        self.sessions[pos].messages.push(message);
        self.touch(pos, session_id);
    }

    /// Rewrite one message's content in place. Unknown session or message
    /// ids leave everything untouched.
    pub fn update_message(&mut self, session_id: &str, message_id: &str, content: impl Into<String>) {
        let Some(pos) = self.position(session_id) else {
            return;
        };
        let Some(message) = self.sessions[pos]
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
        else {
            return;
        };
        message.content = content.into();
        self.touch(pos, session_id);
    }

    /// Delete one message by id. Absent targets are a silent no-op.
    pub fn remove_message(&mut self, session_id: &str, message_id: &str) {
        let Some(pos) = self.position(session_id) else {
            return;
        };
        let before = self.sessions[pos].messages.len();
        self.sessions[pos].messages.retain(|m| m.id != message_id);
        if self.sessions[pos].messages.len() == before {
            return;
        }
        self.touch(pos, session_id);
    }

    /// Rename a session. Does not float it; titles are not message
    /// mutations.
    pub fn update_title(&mut self, session_id: &str, title: impl Into<String>) {
        let Some(pos) = self.position(session_id) else {
            return;
        };
        self.sessions[pos].title = title.into();
        self.persist_session(session_id);
    }

    /// Remove a session and repair the active pointer: the first remaining
    /// session is promoted, and a profile that reseeds on empty gets a
    /// fresh session when none remain.
    pub fn delete_session(&mut self, session_id: &str) {
        let Some(pos) = self.position(session_id) else {
            return;
        };
        self.sessions.remove(pos);

        if self.profile.whole_list_writes {
            self.queue.dispatch(WriteOp::Replace(self.sessions.clone()));
        } else {
            self.queue.dispatch(WriteOp::Delete(session_id.to_string()));
        }

        if self.active_id.as_deref() == Some(session_id) {
            self.active_id = self.sessions.first().map(|s| s.id.clone());
        }
        if self.sessions.is_empty() && self.profile.reseed_on_empty {
            self.start_new_session();
        }
    }

    fn position(&self, session_id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == session_id)
    }

    /// After a message mutation: float the session under profiles that
    /// order by recent activity, then persist.
    fn touch(&mut self, pos: usize, session_id: &str) {
        if self.profile.float_on_touch && pos != 0 {
            let session = self.sessions.remove(pos);
            self.sessions.insert(0, session);
        }
        self.persist_session(session_id);
    }

    fn persist_session(&self, session_id: &str) {
        if self.profile.whole_list_writes {
            self.queue.dispatch(WriteOp::Replace(self.sessions.clone()));
        } else if let Some(session) = self.session(session_id) {
            self.queue.dispatch(WriteOp::Update(session.clone()));
        }
    }

    /// The single merge path for store snapshots. The snapshot replaces
    /// the cache wholesale; sessions still inside their provisional window
    /// and absent from the snapshot are retained at the front. The first
    /// install seeds a session when the store turns out to be empty.
    fn install_snapshot(&mut self, snapshot: Vec<ChatSession>) {
        let first_install = !self.loaded;

        let mut merged: Vec<ChatSession> = self
            .sessions
            .iter()
            .filter(|s| {
                self.pending_creates.contains(&s.id) && !snapshot.iter().any(|r| r.id == s.id)
            })
            .cloned()
            .collect();
        merged.extend(snapshot);
        self.sessions = merged;
        self.loaded = true;

        if self.sessions.is_empty() && first_install {
            self.start_new_session();
            return;
        }
        self.ensure_active();
    }

    /// Reconcile a create ack. Renames the provisional entry in place, or
    /// drops it when a snapshot already delivered the permanent record. A
    /// session deleted during its provisional window needs nothing here;
    /// the write queue already rerouted the delete.
    fn apply_ack(&mut self, ack: &CreateAck) -> bool {
        self.pending_creates.remove(&ack.provisional_id);
        if ack.durable_id == ack.provisional_id {
            return false;
        }

        let durable_cached = self.sessions.iter().any(|s| s.id == ack.durable_id);
        let Some(pos) = self.position(&ack.provisional_id) else {
            return false;
        };
        if durable_cached {
            self.sessions.remove(pos);
        } else {
            self.sessions[pos].id = ack.durable_id.clone();
        }
        if self.active_id.as_deref() == Some(ack.provisional_id.as_str()) {
            self.active_id = Some(ack.durable_id.clone());
        }
        true
    }

    /// Keep the active pointer valid: leave an explicit choice alone while
    /// it references a cached session, otherwise promote the first entry.
    fn ensure_active(&mut self) {
        match &self.active_id {
            Some(id) if self.sessions.iter().any(|s| &s.id == id) => {}
            _ => self.active_id = self.sessions.first().map(|s| s.id.clone()),
        }
    }
}
