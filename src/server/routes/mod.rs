mod chat;
mod filesystem;
mod gitroutes;
mod projects;
mod providers;
mod sessions;
mod terminal;
mod tools;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use super::middleware;
use super::AppState;

pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route(
        "/",
        get(|| async { Json(json!({ "status": "ok" })) }),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api", api_router())
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::strip_trailing_slash))
        .layer(axum::middleware::from_fn(
            middleware::enrich_current_span_middleware,
        ))
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/tools/status", get(tools::tool_status))
        .route("/tools/install", post(tools::install_tool))
        .route("/tools/install-node", post(tools::install_node))
        .route("/jobs/{id}", get(tools::job_status))
        .route("/providers", get(providers::list_providers).post(providers::create_provider))
        .route(
            "/providers/{id}",
            put(providers::update_provider).delete(providers::delete_provider),
        )
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route(
            "/projects/{id}",
            put(projects::update_project).delete(projects::delete_project),
        )
        .route("/projects/{id}/sessions", get(sessions::project_sessions))
        .route("/sessions/scan", get(sessions::scan_sessions))
        .route("/usage/total", get(sessions::total_usage))
        .route("/usage/daily", get(sessions::daily_usage))
        .route("/chat/turn", post(chat::chat_turn))
        .route("/fs/list", get(filesystem::list_directory))
        .route("/fs/read", get(filesystem::read_file))
        .route("/fs/search", post(filesystem::search_content))
        .route("/git/status", get(gitroutes::status))
        .route("/git/diff", get(gitroutes::diff))
        .route("/git/log", get(gitroutes::log))
        .route("/git/stage", post(gitroutes::stage))
        .route("/git/unstage", post(gitroutes::unstage))
        .route("/git/commit", post(gitroutes::commit))
        .route("/git/push", post(gitroutes::push))
        .route("/git/pull", post(gitroutes::pull))
        .route("/terminal/ws", get(terminal::ws_upgrade))
}

async fn not_found(req: axum::extract::Request) -> impl IntoResponse {
    tracing::warn!("unhandled path: {}", req.uri());
    (StatusCode::NOT_FOUND, "Not Found")
}
