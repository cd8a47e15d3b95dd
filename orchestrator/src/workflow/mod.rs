//! The multi-stage workflow: a conditional state machine coordinating
//! planning, retrieval, summarization and evaluation, with a bounded
//! confidence-driven feedback loop.

pub mod engine;
pub mod evaluator;
pub mod feedback;
pub mod planner;
pub mod retriever;
pub mod state;
pub mod summarizer;

pub use engine::{Stage, WorkflowEngine};
pub use evaluator::{Evaluation, Evaluator};
pub use feedback::FeedbackController;
pub use planner::Planner;
pub use retriever::{LocalRetrieval, RetrievalReport, Retriever};
pub use state::WorkflowState;
pub use summarizer::{ResearchSummaries, Summarizer};
