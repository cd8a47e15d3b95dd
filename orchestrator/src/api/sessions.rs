use serde::Deserialize;
use std::sync::Arc;
use warp::{Rejection, Reply};

use crate::models::NewChatResponse;
use crate::service::App;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn handle_new_chat(app: Arc<App>) -> Result<impl Reply, Rejection> {
    let session_id = app.start_chat().await;
    Ok(warp::reply::json(&NewChatResponse { session_id }))
}

pub async fn handle_save_chat(session_id: String, app: Arc<App>) -> Result<impl Reply, Rejection> {
    let response = app
        .save_session(&session_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&response))
}

pub async fn handle_end_chat(session_id: String, app: Arc<App>) -> Result<impl Reply, Rejection> {
    let response = app
        .end_session(&session_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&response))
}

pub async fn handle_list_chats(params: ListParams, app: Arc<App>) -> Result<impl Reply, Rejection> {
    let chats = app
        .list_chats(params.limit.unwrap_or(50), params.offset.unwrap_or(0))
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&serde_json::json!({ "chats": chats })))
}

pub async fn handle_load_chat(session_id: String, app: Arc<App>) -> Result<impl Reply, Rejection> {
    let response = app
        .load_session(&session_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&response))
}
