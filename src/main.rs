mod config;
mod domain;
mod error;
mod gateway;
mod git;
mod jobs;
mod launcher;
mod rpc;
mod scanner;
mod server;
mod stats;
mod store;
mod terminal;
mod tools;

use std::error::Error;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dockhand=info,tower_http=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_tree::HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(false),
        )
        .init();

    let config = Config::from_env();
    let port = config.port;

    let app_state = AppState::build(config).await?;
    let app = server::routes::build_router(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
