//! Summarizer: research-mode per-article and overall syntheses.

use std::sync::Arc;
use tracing::warn;

use crate::chunking::stable_doc_id;
use crate::models::{ArticleSummary, EvidenceItem};
use crate::providers::LanguageModel;

/// Output of a research pass. `per_article` preserves the input ordering so
/// provenance records can be reconstructed; `degraded` lists locators whose
/// summary generation failed.
#[derive(Debug)]
pub struct ResearchSummaries {
    pub per_article: Vec<ArticleSummary>,
    pub overall: String,
    pub degraded: Vec<String>,
}

const NO_CONTENT_SUMMARY: &str = "No sufficient content to summarize.";

pub struct Summarizer {
    llm: Arc<dyn LanguageModel>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// One summary per usable article, in input order, then a synthesis
    /// across whatever succeeded.
    pub async fn summarize(&self, topic: &str, evidence: &[EvidenceItem]) -> ResearchSummaries {
        let mut per_article = Vec::new();
        let mut degraded = Vec::new();

        for item in evidence.iter().filter(|i| i.is_usable()) {
            let prompt = format!(
                "Summarize this article in a short paragraph, then give a citation line \
                 (title, venue and year if identifiable, and the source URL exactly as provided).\n\n\
                 Article URL: {}\n\nArticle text:\n{}",
                item.locator, item.content
            );

            match self.llm.generate(&prompt).await {
                Ok(summary) => per_article.push(ArticleSummary {
                    doc_id: stable_doc_id(&item.locator, &item.title),
                    url: item.locator.clone(),
                    summary,
                }),
                Err(e) => {
                    warn!("article summary failed for {}: {}", item.locator, e);
                    degraded.push(item.locator.clone());
                }
            }
        }

        if per_article.is_empty() {
            return ResearchSummaries {
                per_article,
                overall: NO_CONTENT_SUMMARY.to_string(),
                degraded,
            };
        }

        let overall = self.synthesize(topic, &per_article).await;

        ResearchSummaries {
            per_article,
            overall,
            degraded,
        }
    }

    async fn synthesize(&self, topic: &str, per_article: &[ArticleSummary]) -> String {
        let joined = per_article
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}. {}", i + 1, a.summary))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "You are a research assistant. Synthesize the following article summaries \
             into one coherent overview of the topic \"{topic}\". Note agreements, \
             disagreements and open questions.\n\nSummaries:\n{joined}"
        );

        match self.llm.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                // Degrade to the raw per-article list rather than failing the turn.
                warn!("overall synthesis failed: {}", e);
                joined
            }
        }
    }
}
