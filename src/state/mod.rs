//! In-memory state shared across routes, socket handlers, and timer tasks.

/// Per-participant bookkeeping.
pub mod player;
/// Typed question payloads from external quiz sources.
pub mod question;
/// Process-wide room lookup.
pub mod registry;
/// Aggregate room state and timer slots.
pub mod room;

use std::sync::Arc;

use crate::{config::AppConfig, state::registry::RoomRegistry};

/// Cheaply cloneable handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the room registry plus runtime configuration.
pub struct AppState {
    config: AppConfig,
    rooms: RoomRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config,
            rooms: RoomRegistry::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live rooms keyed by their join code.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }
}
