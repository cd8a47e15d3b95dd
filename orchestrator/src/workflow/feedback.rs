//! Feedback controller: the bounded retry gate and evidence merge.

use std::collections::HashSet;

use crate::models::{EvidenceItem, WorkflowMode};

/// Decides whether a turn earns its one supplementary quick search.
///
/// The retry budget is configurable but always finite; research mode is a
/// single-shot synthesis and never retries.
#[derive(Debug, Clone)]
pub struct FeedbackController {
    confidence_threshold: f64,
    max_retries: u32,
}

impl FeedbackController {
    pub fn new(confidence_threshold: f64, max_retries: u32) -> Self {
        Self {
            confidence_threshold,
            max_retries,
        }
    }

    pub fn should_retry(&self, mode: WorkflowMode, confidence: f64, retry_count: u32) -> bool {
        mode == WorkflowMode::Chat
            && confidence < self.confidence_threshold
            && retry_count < self.max_retries
    }

    /// Union by locator; prior items are retained and keep precedence.
    pub fn merge_evidence(prior: &mut Vec<EvidenceItem>, fresh: Vec<EvidenceItem>) {
        let seen: HashSet<String> = prior.iter().map(|i| i.locator.clone()).collect();
        prior.extend(fresh.into_iter().filter(|i| !seen.contains(&i.locator)));
    }
}
