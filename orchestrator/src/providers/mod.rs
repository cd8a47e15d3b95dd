//! Provider seams for the workflow's external capabilities.
//!
//! Each trait is object-safe and `Send + Sync` so stage components can hold
//! `Arc<dyn ...>` handles and tests can swap in mocks.

pub mod fetch;
pub mod llm;
pub mod search;
pub mod vector;

use async_trait::async_trait;

use crate::error::{FetchError, ProviderError};
use crate::models::{ScoredChunk, SearchHit};

/// Text generation given a composed prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Session-scoped similarity search plus chunk indexing.
///
/// Embedding happens behind this seam; the workflow never sees vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(
        &self,
        query: &str,
        session_id: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, ProviderError>;

    async fn upsert(&self, chunks: &[ChunkUpsert]) -> Result<(), ProviderError>;
}

/// One chunk to index, with its provenance fields.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkUpsert {
    pub chunk_id: String,
    pub doc_id: String,
    pub session_id: String,
    pub url: String,
    pub position: i64,
    pub content: String,
}

/// Ranked web search.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, ProviderError>;
}

/// URL to cleaned article text, validated by minimum length.
#[async_trait]
pub trait ArticleFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
