use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

use crate::service::App;

mod chat;
mod research;
mod sessions;

pub fn routes(app: Arc<App>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api = warp::path("api").and(warp::path("v1"));

    let new_chat_route = api
        .and(warp::path("new_chat"))
        .and(warp::post())
        .and(with_app(app.clone()))
        .and_then(sessions::handle_new_chat);

    let chat_route = api
        .and(warp::path("chat"))
        .and(warp::post())
        .and(warp::body::json())
        .and(with_app(app.clone()))
        .and_then(chat::handle_chat);

    let research_route = api
        .and(warp::path("research"))
        .and(warp::post())
        .and(warp::body::json())
        .and(with_app(app.clone()))
        .and_then(research::handle_research);

    let save_route = api
        .and(warp::path("save_chat"))
        .and(warp::path::param())
        .and(warp::post())
        .and(with_app(app.clone()))
        .and_then(sessions::handle_save_chat);

    let end_route = api
        .and(warp::path("end_chat"))
        .and(warp::path::param())
        .and(warp::post())
        .and(with_app(app.clone()))
        .and_then(sessions::handle_end_chat);

    let list_route = api
        .and(warp::path("list_chats"))
        .and(warp::get())
        .and(warp::query())
        .and(with_app(app.clone()))
        .and_then(sessions::handle_list_chats);

    let load_route = api
        .and(warp::path("load_chat"))
        .and(warp::path::param())
        .and(warp::get())
        .and(with_app(app))
        .and_then(sessions::handle_load_chat);

    new_chat_route
        .or(chat_route)
        .or(research_route)
        .or(save_route)
        .or(end_route)
        .or(list_route)
        .or(load_route)
}

fn with_app(
    app: Arc<App>,
) -> impl Filter<Extract = (Arc<App>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || app.clone())
}
