use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::validation::validate_room_code,
    state::question::{Question, RawNumber},
};

/// Payload used to open a new quiz room.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    /// Explicit room code; a random one is generated when omitted.
    #[serde(default)]
    pub room_id: Option<String>,
    /// Identifier of the quiz backing the room, if any.
    #[serde(default)]
    pub quiz_id: Option<i64>,
    /// Ordered question list preloaded into the room.
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
    /// Seconds until the game starts automatically; omit for manual start.
    #[serde(default)]
    pub auto_start_delay: Option<i64>,
}

impl Validate for CreateRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(code) = &self.room_id {
            if let Err(e) = validate_room_code(code) {
                errors.add("room_id", e);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Incoming question definition for a room.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuestionInput {
    /// Stable identifier of the question.
    pub id: i64,
    /// Question text.
    pub text: String,
    /// Answer options.
    #[serde(default)]
    pub options: Vec<String>,
    /// Marker equal to the correct entry of `options`.
    #[serde(default)]
    pub correct_option: Option<String>,
    /// Score weight awarded for a correct answer.
    #[serde(default)]
    pub score: Option<RawNumber>,
    /// Answer window in seconds (`timer` spelling).
    #[serde(default)]
    pub timer: Option<RawNumber>,
    /// Answer window in seconds (`time_limit` spelling).
    #[serde(default)]
    pub time_limit: Option<RawNumber>,
    /// Answer window in seconds (`duration` spelling).
    #[serde(default)]
    pub duration: Option<RawNumber>,
    /// Answer window in seconds (`question_duration` spelling).
    #[serde(default)]
    pub question_duration: Option<RawNumber>,
}

impl From<QuestionInput> for Question {
    fn from(value: QuestionInput) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct_option: value.correct_option,
            score: value.score,
            timer: value.timer,
            time_limit: value.time_limit,
            duration: value.duration,
            question_duration: value.question_duration,
        }
    }
}

/// Summary returned once a room has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSummary {
    /// Join code of the room.
    pub room_id: String,
    /// Identifier of the quiz backing the room, if any.
    pub quiz_id: Option<i64>,
    /// Number of questions preloaded into the room.
    pub question_count: usize,
    /// Details of the scheduled automatic start, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<AutoStartSummary>,
}

/// Auto-start details echoed back to the room creator.
#[derive(Debug, Serialize, ToSchema)]
pub struct AutoStartSummary {
    /// Target time of the automatic start.
    pub scheduled_at: String,
    /// Seconds until the start fires.
    pub delay: f64,
    /// Who requested the schedule.
    pub origin: String,
}
