//! In-memory store of active chat sessions.
//!
//! Each session sits behind its own `tokio::sync::Mutex`; a turn holds the
//! session lock end-to-end, so concurrent requests on the same session id
//! serialize while distinct sessions proceed in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{ChunkRecord, Message, Role};

const TITLE_MAX_CHARS: usize = 80;

/// One active chat session. Source of truth while in memory; persisted only
/// on explicit save/end.
#[derive(Debug)]
pub struct Session {
    pub session_id: String,
    pub user_id: Option<String>,
    pub messages: Vec<Message>,
    /// Chunk ids already indexed for this session (dedupe guard).
    pub chunk_ids: HashSet<String>,
    /// Provenance records accumulated since the last save.
    pub pending_chunks: Vec<ChunkRecord>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: String, user_id: Option<String>) -> Self {
        Session {
            session_id,
            user_id,
            messages: Vec::new(),
            chunk_ids: HashSet::new(),
            pending_chunks: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether any local documents are indexed for this session.
    pub fn has_local_docs(&self) -> bool {
        !self.chunk_ids.is_empty()
    }

    /// The most recent `n` messages, oldest first.
    pub fn recent_history(&self, n: usize) -> Vec<Message> {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..].to_vec()
    }

    /// First user message, truncated, as the persisted title.
    pub fn title(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| {
                if m.content.chars().count() > TITLE_MAX_CHARS {
                    let truncated: String = m.content.chars().take(TITLE_MAX_CHARS).collect();
                    format!("{truncated}...")
                } else {
                    m.content.clone()
                }
            })
            .unwrap_or_else(|| "Untitled Chat".to_string())
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session and return its id.
    pub async fn create(&self, user_id: Option<String>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new(session_id.clone(), user_id);
        self.inner
            .write()
            .await
            .insert(session_id.clone(), Arc::new(Mutex::new(session)));
        session_id
    }

    /// Register a session rehydrated from persistence. Keeps an existing
    /// in-memory entry if one raced ahead.
    pub async fn insert(&self, session: Session) -> SessionHandle {
        let mut map = self.inner.write().await;
        map.entry(session.session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone()
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.inner.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.inner.write().await.remove(session_id)
    }
}
