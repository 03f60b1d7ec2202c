use serde::Deserialize;
use utoipa::ToSchema;

use crate::dto::room::QuestionInput;

/// Commands accepted from the display (screen) WebSocket.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScreenCommand {
    /// Start (or restart) the game, cancelling any pending auto-start.
    StartGame {
        /// Inline question list; the room's preloaded questions when omitted.
        #[serde(default)]
        questions: Option<Vec<QuestionInput>>,
    },
    /// Manually advance to the next question.
    ShowQuestion,
    /// Schedule an automatic game start.
    ScheduleAutoStart {
        /// RFC 3339 target time; takes precedence over `delay` when it parses.
        #[serde(default)]
        start_at: Option<String>,
        /// Seconds from now, used when `start_at` is absent or unparseable.
        #[serde(default)]
        delay: Option<i64>,
        /// Who requested the schedule; defaults to `screen`.
        #[serde(default)]
        origin: Option<String>,
    },
    /// Cancel a pending automatic game start.
    CancelAutoStart {
        /// Who requested the cancellation; defaults to `screen`.
        #[serde(default)]
        origin: Option<String>,
        /// Free-form cancellation reason.
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Commands accepted from a player WebSocket.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Identify as a player; must be the first message on the socket.
    Join {
        /// Display name to register under.
        player: String,
    },
    /// Submit an answer for the active question.
    Answer {
        /// Raw answer value; non-string values are kept verbatim as JSON text.
        #[serde(default)]
        #[schema(value_type = Object)]
        answer: serde_json::Value,
    },
}

/// Coerce a raw answer value into the stored string form.
///
/// `null` means no answer; strings pass through; any other JSON value keeps
/// its literal spelling so equality against the correct-option marker stays
/// predictable.
pub fn normalize_answer(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_tagged_json() {
        let command: ScreenCommand =
            serde_json::from_str(r#"{"action": "show_question"}"#).unwrap();
        assert!(matches!(command, ScreenCommand::ShowQuestion));

        let command: PlayerCommand =
            serde_json::from_str(r#"{"action": "join", "player": "Alice"}"#).unwrap();
        assert!(matches!(command, PlayerCommand::Join { player } if player == "Alice"));
    }

    #[test]
    fn answers_normalize_to_strings() {
        assert_eq!(normalize_answer(&serde_json::Value::Null), None);
        assert_eq!(
            normalize_answer(&serde_json::json!("Paris")),
            Some("Paris".to_string())
        );
        assert_eq!(normalize_answer(&serde_json::json!(4)), Some("4".to_string()));
    }
}
