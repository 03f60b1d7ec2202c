use axum::extract::ws::Message;
use indexmap::IndexMap;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::state::{player::Player, question::Question};

#[derive(Debug, Clone)]
/// Handle used to push messages to a connected display or player socket.
pub struct ClientConnection {
    /// Sender half of the per-socket writer channel.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// One entry of the append-only per-room event log.
///
/// Serializes to the wire envelope `{"event": ..., "payload": ...}` so the
/// log can be replayed to late joiners byte-for-byte.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Event name as it appears on the wire.
    pub event: String,
    /// JSON payload broadcast with the event.
    pub payload: serde_json::Value,
}

/// Named slot holding at most one outstanding background timer for a room.
///
/// Stale firings are detected through the generation counter: every
/// supersession bumps it, and a task that wakes up compares the generation it
/// was armed with before producing any side effect. The firing task claims
/// its own slot (dropping the handle without aborting), so a timer can never
/// cancel itself.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    /// Invalidate whatever occupied the slot and return the next generation.
    ///
    /// Any stored handle is aborted so a superseded timer cannot fire late
    /// and double-process a transition.
    pub fn supersede(&mut self) -> u64 {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation
    }

    /// Store the handle of a task spawned for `generation`.
    ///
    /// A handle armed for a stale generation is aborted immediately instead.
    pub fn arm(&mut self, generation: u64, handle: JoinHandle<()>) {
        if generation == self.generation {
            self.handle = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Called by the firing task itself: take ownership of the slot.
    ///
    /// Returns `false` when the task has been superseded and must exit
    /// without side effects. On success the handle is dropped, never
    /// aborted, since it belongs to the caller.
    pub fn claim(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.handle = None;
        true
    }

    /// Whether a task is currently armed in this slot.
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

/// Aggregate state of one live quiz session.
///
/// All fields are mutated under the room's mutex; the two timer slots are the
/// only coupling with background tasks.
#[derive(Debug)]
pub struct Room {
    /// Short unique join code.
    pub code: String,
    /// Identifier of the quiz backing this room, if any.
    pub quiz_id: Option<i64>,
    /// Participants keyed by display name, in join order.
    pub players: IndexMap<String, Player>,
    /// Shared display connection, when attached.
    pub screen: Option<ClientConnection>,
    /// Player connections keyed by display name.
    pub sockets: IndexMap<String, ClientConnection>,
    /// Ordered question list for the current game.
    pub questions: Vec<Question>,
    /// Index of the active question; `None` before the first start, values
    /// at or past `questions.len()` mean the game has finished.
    pub current_question_index: Option<usize>,
    /// When the active question was shown.
    pub question_started_at: Option<OffsetDateTime>,
    /// Answer window of the active question, in seconds.
    pub question_duration: Option<u64>,
    /// Raw answers recorded for the active question; a `None` value marks a
    /// player defaulted by timeout or results backfill.
    pub answers: IndexMap<String, Option<String>>,
    /// Outstanding question-timeout task.
    pub question_timer: TimerSlot,
    /// Outstanding auto-start task.
    pub auto_start: TimerSlot,
    /// Target time of the scheduled auto-start, if any.
    pub auto_start_at: Option<OffsetDateTime>,
    /// Who requested the scheduled auto-start.
    pub auto_start_origin: Option<String>,
    /// Append-only event history replayed to newly attached sockets.
    pub events: Vec<EventRecord>,
}

impl Room {
    /// Build an empty room under `code`.
    pub fn new(code: impl Into<String>, quiz_id: Option<i64>) -> Self {
        Self {
            code: code.into(),
            quiz_id,
            players: IndexMap::new(),
            screen: None,
            sockets: IndexMap::new(),
            questions: Vec::new(),
            current_question_index: None,
            question_started_at: None,
            question_duration: None,
            answers: IndexMap::new(),
            question_timer: TimerSlot::default(),
            auto_start: TimerSlot::default(),
            auto_start_at: None,
            auto_start_origin: None,
            events: Vec::new(),
        }
    }

    /// Register a player, creating the record on first join (idempotent).
    pub fn ensure_player(&mut self, name: &str) -> &mut Player {
        self.players
            .entry(name.to_string())
            .or_insert_with(|| Player::new(name))
    }

    /// The question currently being asked, if the index points inside the list.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index?)
    }

    /// Whether every registered player has answered the active question.
    ///
    /// Empty rooms never reach quorum. Disconnected players still count:
    /// they stay unanswered until the question timeout defaults them.
    pub fn all_answered(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|player| player.answered)
    }
}
