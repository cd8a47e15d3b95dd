//! Durable storage for transcripts and provenance chunks (sqlite).
//!
//! Saves are explicit checkpoints triggered by the caller; the workflow
//! engine never writes here mid-turn.

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::db::DbPool;
use crate::error::WorkflowError;
use crate::models::{ChatListEntry, ChatSession, ChunkRecord, Message};

#[derive(Clone)]
pub struct PersistenceGateway {
    pool: DbPool,
}

impl PersistenceGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or update a transcript keyed by session id.
    pub async fn save_transcript(&self, session: &ChatSession) -> Result<(), WorkflowError> {
        let messages_json = serde_json::to_string(&session.messages)?;

        sqlx::query(
            "INSERT INTO chats (session_id, title, user_id, messages_json, closed, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
               title = excluded.title,
               user_id = excluded.user_id,
               messages_json = excluded.messages_json,
               closed = excluded.closed,
               updated_at = excluded.updated_at",
        )
        .bind(&session.session_id)
        .bind(&session.title)
        .bind(&session.user_id)
        .bind(&messages_json)
        .bind(session.closed)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_transcript(
        &self,
        session_id: &str,
    ) -> Result<Option<ChatSession>, WorkflowError> {
        let row = sqlx::query(
            "SELECT session_id, title, user_id, messages_json, closed, created_at, updated_at
             FROM chats WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let messages: Vec<Message> = serde_json::from_str(row.get::<String, _>("messages_json").as_str())?;

        Ok(Some(ChatSession {
            session_id: row.get("session_id"),
            title: row.get("title"),
            user_id: row.get("user_id"),
            messages,
            closed: row.get("closed"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        }))
    }

    pub async fn list_chats(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatListEntry>, WorkflowError> {
        // A negative LIMIT means unbounded in sqlite; clamp both values.
        let rows = sqlx::query(
            "SELECT session_id, title, created_at, updated_at
             FROM chats ORDER BY updated_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ChatListEntry {
                session_id: row.get("session_id"),
                title: row.get("title"),
                created_at: row.get::<DateTime<Utc>, _>("created_at"),
                updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
            })
            .collect())
    }

    /// Persist provenance chunks, ignoring ids already recorded.
    pub async fn save_chunks(&self, chunks: &[ChunkRecord]) -> Result<(), WorkflowError> {
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (chunk_id, doc_id, session_id, url, position, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(chunk_id) DO NOTHING",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.doc_id)
            .bind(&chunk.session_id)
            .bind(&chunk.url)
            .bind(chunk.position)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Chunk ids previously persisted for a session, used to rehydrate the
    /// in-memory dedupe set.
    pub async fn chunk_ids_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<String>, WorkflowError> {
        let rows = sqlx::query("SELECT chunk_id FROM chunks WHERE session_id = ?")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("chunk_id")).collect())
    }
}
