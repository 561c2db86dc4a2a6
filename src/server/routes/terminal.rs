use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;

use crate::server::AppState;
use crate::terminal::handle_socket;

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.pty_registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}
