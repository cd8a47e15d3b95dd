use std::sync::Arc;
use tracing::info;
use warp::{Rejection, Reply};

use crate::models::ResearchRequest;
use crate::service::App;

pub async fn handle_research(
    request: ResearchRequest,
    app: Arc<App>,
) -> Result<impl Reply, Rejection> {
    info!("research run: {}", request.topic);

    let response = app
        .run_research(
            request.session_id,
            &request.topic,
            request.urls.unwrap_or_default(),
        )
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&response))
}
