use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
};

use crate::{services::websocket_service, state::SharedState};

/// Player device sockets.
pub fn router() -> Router<SharedState> {
    Router::new().route("/ws", get(player_socket))
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "players",
    responses(
        (status = 101, description = "Switching protocols; the first frame must be `identify` with a participant id"),
        (status = 400, description = "Not a WebSocket upgrade request")
    )
)]
/// Upgrade to a player socket.
pub async fn player_socket(State(state): State<SharedState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| websocket_service::handle_socket(state, socket))
}
