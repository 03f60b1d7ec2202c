//! Service layer: room lifecycle, phase control, fanout, and scheduling.

/// OpenAPI documentation generation.
pub mod documentation;
/// Event fanout and replay over room sockets.
pub mod fanout;
/// Health check service.
pub mod health_service;
/// Room lifecycle and question phase control.
pub mod room_service;
/// Cancellable delayed-start scheduling.
pub mod scheduler;
/// Correctness evaluation, scores, and scoreboards.
pub mod scoring;
/// WebSocket connection and message handling service.
pub mod websocket_service;
