use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws/screen/{room_id}",
    tag = "ws",
    params(("room_id" = String, Path, description = "Join code of the room")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a display (screen) WebSocket session.
pub async fn screen_ws(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_screen_socket(state, socket, room_id))
}

#[utoipa::path(
    get,
    path = "/ws/player/{room_id}",
    tag = "ws",
    params(("room_id" = String, Path, description = "Join code of the room")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a player WebSocket session.
pub async fn player_ws(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_player_socket(state, socket, room_id))
}

/// Configure the WebSocket endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/ws/screen/{room_id}", get(screen_ws))
        .route("/ws/player/{room_id}", get(player_ws))
}
