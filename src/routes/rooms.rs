use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::room::{CreateRoomRequest, RoomSummary},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Routes handling room bootstrap operations.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms", post(create_room))
}

#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomSummary)
    )
)]
/// Create a fresh room, optionally scheduling an automatic start.
pub async fn create_room(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<RoomSummary>, AppError> {
    payload.validate()?;
    let summary = room_service::create_room(&state, payload).await?;
    Ok(Json(summary))
}
