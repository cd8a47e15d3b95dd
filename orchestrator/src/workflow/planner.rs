//! Planner: picks the retrieval strategy for a chat turn.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{Message, RouteMode, RoutingDecision};
use crate::providers::LanguageModel;

/// Routing heuristic: time-sensitive keywords and local-document
/// availability first, then an optional language-model intent check.
/// Deterministic given identical inputs apart from that optional call.
pub struct Planner {
    keywords: Vec<String>,
    llm: Option<Arc<dyn LanguageModel>>,
}

impl Planner {
    pub fn new(keywords: Vec<String>, llm: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { keywords, llm }
    }

    pub async fn plan(
        &self,
        query: &str,
        _history: &[Message],
        has_local_docs: bool,
    ) -> RoutingDecision {
        if self.contains_time_keyword(query) {
            return RoutingDecision {
                mode: RouteMode::Web,
                reason: "time_sensitive".to_string(),
            };
        }

        if !has_local_docs {
            return RoutingDecision {
                mode: RouteMode::Web,
                reason: "no_local_docs".to_string(),
            };
        }

        // Keyword miss with local docs available: let the model catch
        // implied time-sensitivity. Failure falls back to the keyword-only
        // result (local).
        if let Some(llm) = &self.llm {
            match self.classify_intent(llm.as_ref(), query).await {
                Ok(true) => {
                    return RoutingDecision {
                        mode: RouteMode::Web,
                        reason: "model_flagged_time_sensitive".to_string(),
                    };
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("intent classification failed, keyword heuristic stands: {}", e);
                }
            }
        }

        debug!("routing local: session has usable documents");
        RoutingDecision {
            mode: RouteMode::Local,
            reason: "sufficient_local_docs".to_string(),
        }
    }

    fn contains_time_keyword(&self, query: &str) -> bool {
        let ql = query.to_lowercase();
        self.keywords.iter().any(|kw| ql.contains(kw.as_str()))
    }

    async fn classify_intent(
        &self,
        llm: &dyn LanguageModel,
        query: &str,
    ) -> Result<bool, crate::error::ProviderError> {
        let prompt = format!(
            "Does answering this question require fresh information from the live web \
             (current events, prices, weather, anything that changes over time)? \
             Reply with exactly one word: yes or no.\n\nQuestion:\n{query}"
        );
        let reply = llm.generate(&prompt).await?;
        Ok(reply.trim().to_lowercase().starts_with("yes"))
    }
}
