use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz screen backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::websocket::screen_ws,
        crate::routes::websocket::player_ws,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::QuestionInput,
            crate::dto::room::RoomSummary,
            crate::dto::ws::ScreenCommand,
            crate::dto::ws::PlayerCommand,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room bootstrap operations"),
        (name = "ws", description = "WebSocket endpoints for screens and players"),
    )
)]
pub struct ApiDoc;
