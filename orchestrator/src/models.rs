use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One turn in a chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Persisted chat transcript row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed: bool,
}

/// Provenance record linking an answer back to the evidence that fed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub doc_id: String,
    pub session_id: String,
    pub url: String,
    pub position: i64,
}

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceOrigin {
    LocalChunk,
    WebResult,
    ExplicitUrl,
}

/// Fetch/validation outcome for a single evidence item. Non-usable items
/// stay in the state for provenance but are excluded downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum EvidenceStatus {
    Ok,
    TooShort { len: usize },
    Failed { reason: String },
}

/// One retrieved unit of content considered by the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub origin: EvidenceOrigin,
    pub content: String,
    pub locator: String,
    pub title: String,
    pub score: Option<f64>,
    pub status: EvidenceStatus,
}

impl EvidenceItem {
    pub fn is_usable(&self) -> bool {
        matches!(self.status, EvidenceStatus::Ok)
    }
}

/// Citation attached to a final answer, deduplicated by locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub locator: String,
    pub title: String,
}

/// Planner output: which retrieval strategy to run, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub mode: RouteMode,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    Local,
    Web,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowMode {
    Chat,
    Research,
}

/// One ranked result from a web search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    /// Snippet or pre-extracted content; may be empty for URL-only hits.
    pub content: String,
}

/// One match from the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub content: String,
    pub score: f64,
    pub locator: String,
}

/// Per-article summary produced in research mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub doc_id: String,
    pub url: String,
    pub summary: String,
}

// API request/response models

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<Source>,
}

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub session_id: Option<String>,
    pub topic: String,
    pub urls: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ResearchResponse {
    pub session_id: String,
    pub topic: String,
    pub per_article: Vec<ArticleSummary>,
    pub overall_summary: String,
}

#[derive(Debug, Serialize)]
pub struct NewChatResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct SaveChatResponse {
    pub message: String,
    pub session_id: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ChatListEntry {
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LoadChatResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
}
