use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the current health payload.
///
/// The engine holds no external connections, so the process being up means
/// healthy; the active room count is included for operators.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.rooms().len())
}
