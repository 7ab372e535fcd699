//! Embedded session store backed by `SQLite`.
//!
//! The whole session list persists as one JSON array under a fixed key,
//! mirroring a single browser-storage entry. Missing or malformed data
//! loads as empty history, never as an error.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;
use tokio::sync::watch;
use tracing::warn;

use super::session::ChatSession;
use super::store::{SessionFeed, SessionStore, StoreError, StoreProfile, StoreResult};

/// Fixed key the whole list lives under.
const HISTORY_KEY: &str = "chat_history";

pub struct LocalStore {
    db: Mutex<Connection>,
}

impl LocalStore {
    /// Open or create the history database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InvalidData(format!(
                    "failed to create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let db = Connection::open(path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        Ok(Self { db: Mutex::new(db) })
    }

    /// Read and parse the stored list. Absent row or unparseable JSON
    /// count as empty history.
    fn read_list(db: &Connection) -> StoreResult<Vec<ChatSession>> {
        let raw: Option<String> = db
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![HISTORY_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(sessions) => Ok(sessions),
            Err(e) => {
                warn!("discarding malformed chat history: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// Persist the list wholesale. An empty list removes the row entirely.
    fn write_list(db: &Connection, sessions: &[ChatSession]) -> StoreResult<()> {
        if sessions.is_empty() {
            db.execute("DELETE FROM kv WHERE key = ?1", params![HISTORY_KEY])?;
            return Ok(());
        }

        let json = serde_json::to_string(sessions)?;
        db.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![HISTORY_KEY, json],
        )?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for LocalStore {
    fn profile(&self) -> StoreProfile {
        StoreProfile::LOCAL
    }

    async fn load(&self) -> StoreResult<SessionFeed> {
        let db = self.db.lock().await;
        Ok(SessionFeed::Snapshot(Self::read_list(&db)?))
    }

    async fn save(&self, sessions: &[ChatSession]) -> StoreResult<()> {
        let db = self.db.lock().await;
        Self::write_list(&db, sessions)
    }

    async fn create(&self, session: &ChatSession) -> StoreResult<String> {
        let db = self.db.lock().await;
        let mut sessions = Self::read_list(&db)?;
        sessions.insert(0, session.clone());
        Self::write_list(&db, &sessions)?;
        // Ids are client-synthesized here; the provisional id is permanent.
        Ok(session.id.clone())
    }

    async fn update(&self, session: &ChatSession) -> StoreResult<()> {
        let db = self.db.lock().await;
        let mut sessions = Self::read_list(&db)?;
        if let Some(slot) = sessions.iter_mut().find(|s| s.id == session.id) {
            *slot = session.clone();
            Self::write_list(&db, &sessions)?;
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> StoreResult<()> {
        let db = self.db.lock().await;
        let mut sessions = Self::read_list(&db)?;
        let before = sessions.len();
        sessions.retain(|s| s.id != session_id);
        if sessions.len() != before {
            Self::write_list(&db, &sessions)?;
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<watch::Receiver<SessionFeed>> {
        None
    }
}
