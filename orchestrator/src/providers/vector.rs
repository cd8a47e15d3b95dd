//! HTTP client for the vector store service.
//!
//! The service owns embedding and index management; this client speaks a
//! small JSON protocol: `POST /search` and `POST /upsert`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChunkUpsert, VectorStore};
use crate::error::ProviderError;
use crate::models::ScoredChunk;

pub struct HttpVectorStore {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    matches: Vec<ScoredChunk>,
}

impl HttpVectorStore {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn search(
        &self,
        query: &str,
        session_id: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, ProviderError> {
        let body = json!({
            "query": query,
            "filter": { "session_id": session_id },
            "top_k": top_k,
        });

        let resp = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(parsed.matches)
    }

    async fn upsert(&self, chunks: &[ChunkUpsert]) -> Result<(), ProviderError> {
        self.http
            .post(format!("{}/upsert", self.base_url))
            .json(&json!({ "chunks": chunks }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
