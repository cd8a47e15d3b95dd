use std::sync::Arc;
use tracing::info;
use warp::{Rejection, Reply};

use crate::models::ChatRequest;
use crate::service::App;

pub async fn handle_chat(request: ChatRequest, app: Arc<App>) -> Result<impl Reply, Rejection> {
    info!("chat turn: {}", request.message);

    let response = app
        .run_chat(request.session_id, &request.message)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&response))
}
