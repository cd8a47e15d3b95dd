//! Retriever: executes the routed strategy and normalizes everything into
//! evidence items. Three strategies exist: local similarity search, web
//! search plus article fetch, and explicit-URL fetch (research mode).

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::FetchError;
use crate::models::{EvidenceItem, EvidenceOrigin, EvidenceStatus, SearchHit};
use crate::providers::{ArticleFetch, VectorStore, WebSearch};

/// Outcome of the local strategy. Insufficiency is a signal, not an error;
/// the engine falls back to web search.
#[derive(Debug)]
pub enum LocalRetrieval {
    Sufficient(Vec<EvidenceItem>),
    Insufficient {
        survivors: Vec<EvidenceItem>,
        reason: String,
    },
}

/// Web-strategy output. `degraded_reason` is set only when the evidence set
/// is empty because no provider call succeeded.
#[derive(Debug, Default)]
pub struct RetrievalReport {
    pub items: Vec<EvidenceItem>,
    pub degraded_reason: Option<String>,
}

pub struct Retriever {
    vector: Arc<dyn VectorStore>,
    search: Arc<dyn WebSearch>,
    fetcher: Arc<dyn ArticleFetch>,
    retrieval_k: usize,
    sim_threshold: f64,
    min_docs: usize,
    max_search_results: usize,
    quick_search_results: usize,
}

impl Retriever {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vector: Arc<dyn VectorStore>,
        search: Arc<dyn WebSearch>,
        fetcher: Arc<dyn ArticleFetch>,
        retrieval_k: usize,
        sim_threshold: f64,
        min_docs: usize,
        max_search_results: usize,
        quick_search_results: usize,
    ) -> Self {
        Self {
            vector,
            search,
            fetcher,
            retrieval_k,
            sim_threshold,
            min_docs,
            max_search_results,
            quick_search_results,
        }
    }

    /// Similarity search against the session's indexed chunks, filtered by
    /// the similarity threshold. Fewer than `min_docs` survivors (or a
    /// provider failure) signals insufficiency.
    pub async fn retrieve_local(&self, query: &str, session_id: &str) -> LocalRetrieval {
        let matches = match self
            .vector
            .search(query, session_id, self.retrieval_k)
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!("vector search failed for session {}: {}", session_id, e);
                return LocalRetrieval::Insufficient {
                    survivors: vec![],
                    reason: format!("vector store unavailable: {e}"),
                };
            }
        };

        let survivors: Vec<EvidenceItem> = matches
            .into_iter()
            .filter(|m| m.score >= self.sim_threshold)
            .map(|m| EvidenceItem {
                origin: EvidenceOrigin::LocalChunk,
                content: m.content,
                title: String::new(),
                locator: m.locator,
                score: Some(m.score),
                status: EvidenceStatus::Ok,
            })
            .collect();

        if survivors.len() < self.min_docs {
            let reason = format!(
                "only {} of {} required local matches above threshold",
                survivors.len(),
                self.min_docs
            );
            return LocalRetrieval::Insufficient { survivors, reason };
        }

        LocalRetrieval::Sufficient(survivors)
    }

    /// Web strategy: fetch explicit URLs when supplied, otherwise search and
    /// fetch each result. `quick` bounds the result count for the feedback
    /// pass.
    pub async fn retrieve_web(
        &self,
        query: &str,
        explicit_urls: &[String],
        quick: bool,
    ) -> RetrievalReport {
        if !explicit_urls.is_empty() {
            let items = self
                .fetch_all(
                    explicit_urls.iter().map(|u| SearchHit {
                        title: String::new(),
                        url: u.clone(),
                        content: String::new(),
                    }),
                    EvidenceOrigin::ExplicitUrl,
                )
                .await;
            return Self::report(items, "all explicit URL fetches failed");
        }

        let cap = if quick {
            self.quick_search_results
        } else {
            self.max_search_results
        };

        let hits = match self.search.search(query, cap).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("web search failed: {}", e);
                return RetrievalReport {
                    items: vec![],
                    degraded_reason: Some(format!("web search unavailable: {e}")),
                };
            }
        };

        if hits.is_empty() {
            return RetrievalReport {
                items: vec![],
                degraded_reason: Some("web search returned no results".to_string()),
            };
        }

        let items = self
            .fetch_all(hits.into_iter().take(cap), EvidenceOrigin::WebResult)
            .await;
        Self::report(items, "all result fetches failed")
    }

    /// Fetch a set of URLs concurrently; they are mutually independent.
    /// Failed or rejected articles stay in the list with a non-Ok status.
    async fn fetch_all(
        &self,
        hits: impl Iterator<Item = SearchHit>,
        origin: EvidenceOrigin,
    ) -> Vec<EvidenceItem> {
        let futures = hits.map(|hit| async move {
            match self.fetcher.fetch(&hit.url).await {
                Ok(text) => EvidenceItem {
                    origin,
                    content: text,
                    title: hit.title,
                    locator: hit.url,
                    score: None,
                    status: EvidenceStatus::Ok,
                },
                Err(FetchError::TooShort { len, min, .. }) => {
                    info!("dropping {}: article below minimum length ({} < {})", hit.url, len, min);
                    EvidenceItem {
                        origin,
                        content: String::new(),
                        title: hit.title,
                        locator: hit.url,
                        score: None,
                        status: EvidenceStatus::TooShort { len },
                    }
                }
                Err(e) => {
                    warn!("fetch failed: {}", e);
                    EvidenceItem {
                        origin,
                        content: String::new(),
                        title: hit.title,
                        locator: hit.url,
                        score: None,
                        status: EvidenceStatus::Failed {
                            reason: e.to_string(),
                        },
                    }
                }
            }
        });

        join_all(futures).await
    }

    fn report(items: Vec<EvidenceItem>, empty_reason: &str) -> RetrievalReport {
        let degraded_reason = if items.iter().any(|i| i.is_usable()) {
            None
        } else {
            Some(empty_reason.to_string())
        };
        RetrievalReport {
            items,
            degraded_reason,
        }
    }
}
