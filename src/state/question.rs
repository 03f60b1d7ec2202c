use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Loosely-spelled numeric value accepted from external quiz content.
///
/// Quiz sources routinely mix integers, floats, and strings (with either a
/// dot or a comma as the decimal separator) for the same field, so durations
/// and score weights are deserialized through this union and interpreted
/// tolerantly afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RawNumber {
    /// Plain JSON integer.
    Int(i64),
    /// Plain JSON float.
    Float(f64),
    /// Number spelled as a string.
    Text(String),
}

impl RawNumber {
    /// Interpret the value as a positive whole number of seconds.
    ///
    /// Floats are truncated; strings must spell an integer. Anything that
    /// does not resolve to a value above zero yields `None` so the caller
    /// can fall through to the next candidate or the default.
    pub fn as_positive_seconds(&self) -> Option<u64> {
        let value = match self {
            Self::Int(value) => *value,
            Self::Float(value) if value.is_finite() => *value as i64,
            Self::Float(_) => return None,
            Self::Text(raw) => raw.trim().parse::<i64>().ok()?,
        };
        u64::try_from(value).ok().filter(|secs| *secs > 0)
    }
}

/// A single quiz question supplied by the external quiz source.
///
/// `id`, `text`, and `options` are required; everything else is optional and
/// explicitly defaulted. The correct-option marker and the score weight never
/// leave the server: broadcasts carry the sanitized projection only.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Question {
    /// Stable identifier of the question within its quiz.
    pub id: i64,
    /// Question text shown to players and on the screen.
    pub text: String,
    /// Answer options offered to players.
    #[serde(default)]
    pub options: Vec<String>,
    /// Marker equal to the correct entry of `options`.
    #[serde(default)]
    pub correct_option: Option<String>,
    /// Score weight awarded for a correct answer; defaults to 1.
    #[serde(default)]
    pub score: Option<RawNumber>,
    /// Answer window in seconds, first recognized spelling.
    #[serde(default)]
    pub timer: Option<RawNumber>,
    /// Answer window in seconds, second recognized spelling.
    #[serde(default)]
    pub time_limit: Option<RawNumber>,
    /// Answer window in seconds, third recognized spelling.
    #[serde(default)]
    pub duration: Option<RawNumber>,
    /// Answer window in seconds, fourth recognized spelling.
    #[serde(default)]
    pub question_duration: Option<RawNumber>,
}

impl Question {
    /// Resolve the answer window for this question.
    ///
    /// The first duration key holding a positive whole number of seconds
    /// wins; malformed or missing values degrade to `default_duration`.
    pub fn resolve_duration(&self, default_duration: u64) -> u64 {
        [
            &self.timer,
            &self.time_limit,
            &self.duration,
            &self.question_duration,
        ]
        .into_iter()
        .flatten()
        .find_map(RawNumber::as_positive_seconds)
        .unwrap_or(default_duration)
    }
}
