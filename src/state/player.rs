use time::OffsetDateTime;

use crate::services::scoring::Score;

/// Per-participant score and response-time bookkeeping inside a room.
///
/// A player record is created on first join and lives as long as the room;
/// statistics are wiped in full when a game (re)starts, never mid-game.
#[derive(Debug, Clone)]
pub struct Player {
    /// Display name, unique within the room.
    pub name: String,
    /// Whether the player has answered the active question.
    pub answered: bool,
    /// Accumulated score for the current game.
    pub score: Score,
    /// Timestamp of the most recent answer submission.
    pub last_answered_at: Option<OffsetDateTime>,
    /// Clamped response time of the most recent answer, in seconds.
    pub last_response_time: Option<f64>,
    /// Every clamped response time recorded this game, in question order.
    pub response_times: Vec<f64>,
    /// Running sum of [`Player::response_times`].
    pub total_response_time: f64,
    /// Fastest recorded response time this game.
    pub min_response_time: Option<f64>,
    /// Slowest recorded response time this game.
    pub max_response_time: Option<f64>,
}

impl Player {
    /// Build a fresh record for a player joining a room.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            answered: false,
            score: Score::ZERO,
            last_answered_at: None,
            last_response_time: None,
            response_times: Vec::new(),
            total_response_time: 0.0,
            min_response_time: None,
            max_response_time: None,
        }
    }

    /// Wipe score and every statistic for a fresh game.
    pub fn reset_for_game(&mut self) {
        self.answered = false;
        self.score = Score::ZERO;
        self.last_answered_at = None;
        self.last_response_time = None;
        self.response_times.clear();
        self.total_response_time = 0.0;
        self.min_response_time = None;
        self.max_response_time = None;
    }

    /// Clear the per-question flags before the next question is shown.
    pub fn reset_for_question(&mut self) {
        self.answered = false;
        self.last_answered_at = None;
        self.last_response_time = None;
    }

    /// Append a clamped response time and refresh the running aggregates.
    pub fn record_response_time(&mut self, seconds: f64) {
        self.response_times.push(seconds);
        self.total_response_time += seconds;
        self.min_response_time = Some(self.min_response_time.map_or(seconds, |m| m.min(seconds)));
        self.max_response_time = Some(self.max_response_time.map_or(seconds, |m| m.max(seconds)));
    }
}
