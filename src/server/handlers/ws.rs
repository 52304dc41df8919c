use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;

use crate::server::AppState;
use crate::session::serve_socket;

/// Upgrades to a WebSocket speaking the session protocol
pub async fn session_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let AppState {
        controller, socket, ..
    } = state;
    ws.max_message_size(socket.max_message_size)
        .on_upgrade(move |stream| serve_socket(stream, controller, socket))
}
