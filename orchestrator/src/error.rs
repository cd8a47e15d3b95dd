use thiserror::Error;
use warp::{reject::Reject, Rejection, Reply};

/// Failure of an upstream capability (language model, web search, vector store).
///
/// These are absorbed at the call site wherever the workflow can degrade
/// instead; only the final answer-generation step lets one escape the turn.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider returned malformed payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Unavailable(e.to_string())
    }
}

/// Per-article fetch failure. Items are dropped and logged, never surfaced
/// to the caller individually.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("fetch failed for {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("article at {url} below minimum length ({len} < {min} chars)")]
    TooShort { url: String, len: usize, min: usize },
}

/// Turn-level failures that reach the caller.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("answer generation failed: {0}")]
    Evaluation(ProviderError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Reject for WorkflowError {}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(wf_err) = err.find::<WorkflowError>() {
        let (code, message) = match wf_err {
            WorkflowError::SessionNotFound(_) => (404, "Session not found"),
            WorkflowError::Evaluation(_) => (502, "Answer generation failed"),
            _ => (500, "Internal server error"),
        };

        let json = warp::reply::json(&serde_json::json!({
            "error": message,
            "details": wf_err.to_string(),
        }));

        Ok(warp::reply::with_status(
            json,
            warp::http::StatusCode::from_u16(code).unwrap(),
        ))
    } else {
        Err(err)
    }
}
