use std::sync::Arc;
use tracing::info;
use warp::Filter;

use orchestrator::{api, config, db, error, middleware, service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting agentic research assistant");

    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    let db_pool = db::create_pool(&config.database_url).await?;
    info!("Database connection pool created");

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    info!("Database migrations applied");

    let port = config.port;
    let app = Arc::new(service::App::new(config, db_pool)?);

    let api_routes = api::routes(app)
        .recover(error::handle_rejection)
        .with(warp::log("api"))
        .with(middleware::cors());

    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

    let routes = health.or(api_routes);

    let addr = ([0, 0, 0, 0], port);
    info!("Server listening on {}", addr.1);

    warp::serve(routes).run(addr).await;

    Ok(())
}
