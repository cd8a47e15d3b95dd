use crate::models::{
    ArticleSummary, EvidenceItem, Message, RoutingDecision, Source, WorkflowMode,
};

/// Mutable state carried through one turn of the workflow.
///
/// Owned exclusively by the in-flight request (the session lock is held for
/// the whole turn) and discarded once the response is built.
#[derive(Debug)]
pub struct WorkflowState {
    pub session_id: String,
    pub query: String,
    /// Prior turns, already bounded to the configured window.
    pub history: Vec<Message>,
    pub mode: WorkflowMode,
    /// Explicit URLs supplied by a research request.
    pub urls: Vec<String>,
    /// Whether the session had any indexed local documents at turn start.
    pub has_local_docs: bool,

    pub decision: Option<RoutingDecision>,
    pub evidence: Vec<EvidenceItem>,
    /// Set when retrieval came back empty because every provider failed.
    pub degraded_reason: Option<String>,

    pub per_article: Vec<ArticleSummary>,
    pub overall_summary: Option<String>,

    pub answer: Option<String>,
    pub confidence: f64,
    pub sources: Vec<Source>,
    pub retry_count: u32,
}

impl WorkflowState {
    pub fn new(
        session_id: impl Into<String>,
        query: impl Into<String>,
        mode: WorkflowMode,
        history: Vec<Message>,
        has_local_docs: bool,
    ) -> Self {
        WorkflowState {
            session_id: session_id.into(),
            query: query.into(),
            history,
            mode,
            urls: Vec::new(),
            has_local_docs,
            decision: None,
            evidence: Vec::new(),
            degraded_reason: None,
            per_article: Vec::new(),
            overall_summary: None,
            answer: None,
            confidence: 0.0,
            sources: Vec::new(),
            retry_count: 0,
        }
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }
}
