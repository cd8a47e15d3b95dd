//! Workflow engine: a fixed directed graph with one conditional edge.
//!
//! ```text
//! Planning → Retrieving → (Summarizing if research) → Evaluating → Done
//!                 ▲                                       │
//!                 └────────────── Retrying ◄──────────────┘  (chat only,
//!                                                             once per turn)
//! ```

use tracing::{info, instrument, warn};

use super::evaluator::Evaluator;
use super::feedback::FeedbackController;
use super::planner::Planner;
use super::retriever::{LocalRetrieval, Retriever};
use super::state::WorkflowState;
use super::summarizer::Summarizer;
use crate::error::WorkflowError;
use crate::models::{RouteMode, RoutingDecision, WorkflowMode};

/// Stages of one workflow turn. The transition table lives in
/// [`Stage::next`] so it can be exercised directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planning,
    Retrieving,
    Summarizing,
    Evaluating,
    Retrying,
    Done,
}

impl Stage {
    /// Transition table, applied after the stage has executed against the
    /// state. The only conditional edges are the research summarization
    /// branch and the confidence gate out of `Evaluating`.
    pub fn next(self, state: &WorkflowState, feedback: &FeedbackController) -> Stage {
        match self {
            Stage::Planning => Stage::Retrieving,
            Stage::Retrieving => match state.mode {
                WorkflowMode::Research => Stage::Summarizing,
                WorkflowMode::Chat => Stage::Evaluating,
            },
            Stage::Summarizing => Stage::Evaluating,
            Stage::Evaluating => {
                if feedback.should_retry(state.mode, state.confidence, state.retry_count) {
                    Stage::Retrying
                } else {
                    Stage::Done
                }
            }
            Stage::Retrying => Stage::Evaluating,
            Stage::Done => Stage::Done,
        }
    }
}

pub struct WorkflowEngine {
    planner: Planner,
    retriever: Retriever,
    summarizer: Summarizer,
    evaluator: Evaluator,
    feedback: FeedbackController,
}

impl WorkflowEngine {
    pub fn new(
        planner: Planner,
        retriever: Retriever,
        summarizer: Summarizer,
        evaluator: Evaluator,
        feedback: FeedbackController,
    ) -> Self {
        Self {
            planner,
            retriever,
            summarizer,
            evaluator,
            feedback,
        }
    }

    /// Drive one turn to completion. Stages run strictly in sequence; the
    /// retry budget inside `feedback` guarantees termination.
    #[instrument(skip_all, fields(session_id = %state.session_id, mode = ?state.mode))]
    pub async fn run(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        let mut stage = Stage::Planning;
        while stage != Stage::Done {
            self.execute(stage, state).await?;
            stage = stage.next(state, &self.feedback);
        }
        Ok(())
    }

    async fn execute(&self, stage: Stage, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        match stage {
            Stage::Planning => {
                let decision = match state.mode {
                    // Research is always a web synthesis; nothing to plan.
                    WorkflowMode::Research => RoutingDecision {
                        mode: RouteMode::Web,
                        reason: "explicit_research".to_string(),
                    },
                    WorkflowMode::Chat => {
                        self.planner
                            .plan(&state.query, &state.history, state.has_local_docs)
                            .await
                    }
                };
                info!(route = ?decision.mode, reason = %decision.reason, "planned");
                state.decision = Some(decision);
            }

            Stage::Retrieving => self.retrieve(state).await,

            Stage::Summarizing => {
                let summaries = self.summarizer.summarize(&state.query, &state.evidence).await;
                if !summaries.degraded.is_empty() {
                    info!(skipped = summaries.degraded.len(), "some articles not summarized");
                }
                state.per_article = summaries.per_article;
                state.overall_summary = Some(summaries.overall);
            }

            Stage::Evaluating => {
                if let Some(reason) = &state.degraded_reason {
                    warn!(%reason, "evaluating without usable evidence");
                }
                let evaluation = self
                    .evaluator
                    .evaluate(
                        &state.query,
                        &state.history,
                        &state.evidence,
                        state.overall_summary.as_deref(),
                        state.degraded_reason.as_deref(),
                    )
                    .await?;
                info!(confidence = evaluation.confidence, "evaluated");
                state.answer = Some(evaluation.answer);
                state.confidence = evaluation.confidence;
                state.sources = evaluation.sources;
            }

            Stage::Retrying => {
                state.retry_count += 1;
                info!(retry = state.retry_count, "confidence below threshold, quick web search");
                let report = self.retriever.retrieve_web(&state.query, &[], true).await;
                FeedbackController::merge_evidence(&mut state.evidence, report.items);
            }

            Stage::Done => {}
        }

        Ok(())
    }

    async fn retrieve(&self, state: &mut WorkflowState) {
        let route = state
            .decision
            .as_ref()
            .map(|d| d.mode)
            .unwrap_or(RouteMode::Web);

        match route {
            RouteMode::Local => {
                match self
                    .retriever
                    .retrieve_local(&state.query, &state.session_id)
                    .await
                {
                    LocalRetrieval::Sufficient(items) => {
                        state.evidence = items;
                    }
                    LocalRetrieval::Insufficient { survivors, reason } => {
                        // Not an error: fall back to the web strategy,
                        // keeping whatever local matches survived.
                        info!(%reason, "local retrieval insufficient, falling back to web");
                        state.decision = Some(RoutingDecision {
                            mode: RouteMode::Web,
                            reason: "insufficient_local_docs".to_string(),
                        });
                        let report = self.retriever.retrieve_web(&state.query, &[], false).await;
                        state.evidence = survivors;
                        FeedbackController::merge_evidence(&mut state.evidence, report.items);
                        if !state.evidence.iter().any(|i| i.is_usable()) {
                            state.degraded_reason = report.degraded_reason;
                        }
                    }
                }
            }
            RouteMode::Web => {
                let report = self
                    .retriever
                    .retrieve_web(&state.query, &state.urls, false)
                    .await;
                state.evidence = report.items;
                state.degraded_reason = report.degraded_reason;
            }
        }
    }
}
