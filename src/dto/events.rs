//! Payloads of the events broadcast to room sockets.
//!
//! Every event travels as an `{"event": ..., "payload": ...}` envelope (see
//! [`crate::state::room::EventRecord`]); the structs here are the payload
//! halves. All timestamps are RFC 3339 strings.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    services::scoring::{Score, ScoreboardEntry},
    state::question::Question,
};

/// Broadcast when a player joins (or re-joins) a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerJoinedEvent {
    /// Name of the player that just joined.
    pub player: String,
    /// Sorted names of every registered player.
    pub players: Vec<String>,
}

/// Projection of a question safe to put on the wire: the correct-option
/// marker and the score weight are stripped.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    /// Stable question identifier.
    pub id: i64,
    /// Question text.
    pub text: String,
    /// Answer options.
    pub options: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            text: question.text.clone(),
            options: question.options.clone(),
        }
    }
}

/// Broadcast when a question opens for answers.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShowQuestionEvent {
    /// The sanitized question.
    pub question: QuestionView,
    /// 1-based position of the question within the game.
    pub question_number: usize,
    /// Total number of questions in the game.
    pub total_questions: usize,
    /// When the question was opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<String>,
    /// Answer window in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_duration: Option<u64>,
    /// Server clock at broadcast time.
    pub server_time: String,
}

/// One player's outcome for a finished question.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResult {
    /// Player display name.
    pub player: String,
    /// Raw recorded answer; `null` when the player was defaulted.
    pub answer: Option<String>,
    /// Whether the answer matched the correct-option marker.
    pub is_correct: bool,
    /// Player's accumulated score after this question.
    #[schema(value_type = f64)]
    pub score: Score,
    /// Whether the player answered (or was defaulted by timeout).
    pub answered: bool,
    /// Clamped response time in seconds, when one was recorded.
    pub response_time: Option<f64>,
}

/// Broadcast when a question closes, before the next one opens.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShowResultsEvent {
    /// Identifier of the question that just closed.
    pub question_id: i64,
    /// The revealed correct answer.
    pub correct_answer: Option<String>,
    /// Per-player outcomes in roster order.
    pub results: Vec<AnswerResult>,
    /// Ranked scoreboard after scoring this question.
    pub scoreboard: Vec<ScoreboardEntry>,
    /// When the closed question had been opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_started_at: Option<String>,
    /// Answer window of the closed question, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_duration: Option<u64>,
    /// Server clock at broadcast time.
    pub server_time: String,
}

/// Broadcast once after the last question of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShowFinalEvent {
    /// Final ranked scoreboard.
    pub scoreboard: Vec<ScoreboardEntry>,
    /// Server clock at broadcast time.
    pub server_time: String,
}

/// Broadcast when an auto-start is scheduled for a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct AutoStartScheduledEvent {
    /// Target time of the automatic start.
    pub scheduled_at: String,
    /// Seconds until the start fires.
    pub delay: f64,
    /// Who requested the schedule.
    pub origin: String,
    /// Server clock at broadcast time.
    pub server_time: String,
}

/// Broadcast when a scheduled auto-start is cancelled.
#[derive(Debug, Serialize, ToSchema)]
pub struct AutoStartCancelledEvent {
    /// Target time of the cancelled start, when one was scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    /// Who requested the cancellation.
    pub origin: String,
    /// Free-form cancellation reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Server clock at broadcast time.
    pub server_time: String,
}

/// Sent only to the originating display connection, never broadcast.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEvent {
    /// Human-readable failure description.
    pub message: String,
}
