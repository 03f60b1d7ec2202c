//! Correctness evaluation, decimal-safe score accumulation, and scoreboard
//! ordering.

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use utoipa::ToSchema;

use crate::state::{
    player::Player,
    question::{Question, RawNumber},
};

/// Number of scaled units per whole point (four fractional digits).
const SCALE: i64 = 10_000;

/// Fixed-point score value with four fractional digits.
///
/// Stored as a scaled integer so repeated accumulation cannot drift the way
/// binary floats do. Rounding happens once, when a weight is parsed, using
/// half-up (away from zero) on the first dropped digit. Whole values render
/// as JSON integers, fractional values as floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Score(i64);

impl Score {
    /// The zero score every player starts a game with.
    pub const ZERO: Score = Score(0);
    /// The default weight awarded for a correct answer.
    pub const ONE: Score = Score(SCALE);

    /// Add another score, saturating at the representable bounds.
    pub fn saturating_add(self, other: Score) -> Score {
        Score(self.0.saturating_add(other.0))
    }

    /// Parse a loosely-spelled weight value.
    ///
    /// Accepts integers, floats, and decimal strings with either a dot or a
    /// comma separator. Returns `None` for anything unparseable so the
    /// caller can fall back to the default weight.
    pub fn parse(raw: &RawNumber) -> Option<Score> {
        match raw {
            RawNumber::Int(value) => value.checked_mul(SCALE).map(Score),
            RawNumber::Float(value) => Score::from_f64(*value),
            RawNumber::Text(raw) => parse_decimal_text(raw),
        }
    }

    fn from_f64(value: f64) -> Option<Score> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * SCALE as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Score(scaled as i64))
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % SCALE == 0 {
            serializer.serialize_i64(self.0 / SCALE)
        } else {
            serializer.serialize_f64(self.0 as f64 / SCALE as f64)
        }
    }
}

/// Parse a decimal string into a scaled score, rounding half-up on the
/// fifth fractional digit. Exponent and other exotic spellings take the
/// float path.
fn parse_decimal_text(raw: &str) -> Option<Score> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', ".");
    let (sign, unsigned) = match normalized.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, normalized.strip_prefix('+').unwrap_or(&normalized)),
    };
    let (int_part, frac_part) = unsigned
        .split_once('.')
        .unwrap_or((unsigned, ""));

    let plain_decimal = !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit());
    if !plain_decimal {
        return normalized.parse::<f64>().ok().and_then(Score::from_f64);
    }

    let whole: i64 = int_part.parse().ok()?;
    let mut frac_units: i64 = 0;
    for (position, digit) in frac_part.bytes().take(4).enumerate() {
        frac_units += i64::from(digit - b'0') * 10i64.pow(3 - position as u32);
    }
    if frac_part.len() > 4 && frac_part.as_bytes()[4] >= b'5' {
        frac_units += 1;
    }
    let scaled = whole.checked_mul(SCALE)?.checked_add(frac_units)?;
    Some(Score(sign * scaled))
}

/// Score weight of a question: its `score` field parsed tolerantly, or 1.
pub fn question_weight(question: &Question) -> Score {
    question
        .score
        .as_ref()
        .and_then(Score::parse)
        .unwrap_or(Score::ONE)
}

/// Whether a recorded answer matches the question's correct-option marker.
pub fn is_correct_answer(answer: Option<&str>, correct_option: Option<&str>) -> bool {
    matches!((answer, correct_option), (Some(given), Some(expected)) if given == expected)
}

/// One row of the ranked scoreboard broadcast with results and finals.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreboardEntry {
    /// Player display name.
    pub player: String,
    /// Accumulated score.
    #[schema(value_type = f64)]
    pub score: Score,
    /// Number of questions this player answered in time.
    pub answered_count: usize,
    /// Sum of recorded response times in seconds; 0 when none.
    pub total_response_time: f64,
    /// Mean response time in seconds; absent when nothing was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time: Option<f64>,
}

/// Build the ranked scoreboard for a room's players.
///
/// Order: descending score, then descending answered count, then ascending
/// average response time (players without one sort last), then player name.
pub fn build_scoreboard(players: &IndexMap<String, Player>) -> Vec<ScoreboardEntry> {
    let mut entries: Vec<ScoreboardEntry> = players
        .values()
        .map(|player| {
            let answered_count = player.response_times.len();
            let total_response_time = if answered_count > 0 {
                player.total_response_time
            } else {
                0.0
            };
            let average_response_time =
                (answered_count > 0).then(|| total_response_time / answered_count as f64);
            ScoreboardEntry {
                player: player.name.clone(),
                score: player.score,
                answered_count,
                total_response_time,
                average_response_time,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.answered_count.cmp(&a.answered_count))
            .then_with(|| {
                let left = a.average_response_time.unwrap_or(f64::INFINITY);
                let right = b.average_response_time.unwrap_or(f64::INFINITY);
                left.partial_cmp(&right).unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.player.cmp(&b.player))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(raw: &str) -> RawNumber {
        RawNumber::Text(raw.into())
    }

    #[test]
    fn parses_integer_and_float_weights() {
        assert_eq!(Score::parse(&RawNumber::Int(3)), Some(Score(30_000)));
        assert_eq!(Score::parse(&RawNumber::Float(2.5)), Some(Score(25_000)));
    }

    #[test]
    fn parses_decimal_strings_with_either_separator() {
        assert_eq!(Score::parse(&text("1.5")), Some(Score(15_000)));
        assert_eq!(Score::parse(&text("1,5")), Some(Score(15_000)));
        assert_eq!(Score::parse(&text("  2 ")), Some(Score(20_000)));
    }

    #[test]
    fn rounds_half_up_on_the_fifth_digit() {
        assert_eq!(Score::parse(&text("0.00005")), Some(Score(1)));
        assert_eq!(Score::parse(&text("0.00004")), Some(Score(0)));
        assert_eq!(Score::parse(&text("1.23455")), Some(Score(12_346)));
    }

    #[test]
    fn garbage_weights_are_rejected() {
        assert_eq!(Score::parse(&text("lots")), None);
        assert_eq!(Score::parse(&text("")), None);
        assert_eq!(Score::parse(&RawNumber::Float(f64::NAN)), None);
    }

    #[test]
    fn whole_scores_render_as_integers() {
        assert_eq!(serde_json::to_string(&Score::ONE).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Score(25_000)).unwrap(), "2.5");
    }

    #[test]
    fn accumulation_does_not_drift() {
        let tenth = Score::parse(&text("0.1")).unwrap();
        let mut total = Score::ZERO;
        for _ in 0..10 {
            total = total.saturating_add(tenth);
        }
        assert_eq!(total, Score::ONE);
        assert_eq!(serde_json::to_string(&total).unwrap(), "1");
    }

    #[test]
    fn correctness_requires_a_present_matching_answer() {
        assert!(is_correct_answer(Some("Paris"), Some("Paris")));
        assert!(!is_correct_answer(Some("Lyon"), Some("Paris")));
        assert!(!is_correct_answer(None, Some("Paris")));
        assert!(!is_correct_answer(None, None));
    }

    #[test]
    fn scoreboard_orders_by_score_count_average_then_name() {
        let mut players = IndexMap::new();

        let mut a = Player::new("A");
        a.score = Score::parse(&RawNumber::Int(10)).unwrap();
        a.record_response_time(1.0);
        a.record_response_time(1.0);
        players.insert("A".to_string(), a);

        let mut b = Player::new("B");
        b.score = Score::parse(&RawNumber::Int(10)).unwrap();
        b.record_response_time(5.0);
        b.record_response_time(5.0);
        b.record_response_time(5.0);
        players.insert("B".to_string(), b);

        let mut c = Player::new("C");
        c.score = Score::parse(&RawNumber::Int(5)).unwrap();
        c.record_response_time(2.0);
        players.insert("C".to_string(), c);

        let scoreboard = build_scoreboard(&players);
        let order: Vec<&str> = scoreboard
            .iter()
            .map(|entry| entry.player.as_str())
            .collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn players_without_an_average_sort_last_within_ties() {
        let mut players = IndexMap::new();
        players.insert("Mute".to_string(), Player::new("Mute"));

        let mut active = Player::new("Active");
        active.record_response_time(9.0);
        players.insert("Active".to_string(), active);

        let entries = build_scoreboard(&players);
        assert_eq!(entries[0].player, "Active");
        assert_eq!(entries[1].player, "Mute");
        assert_eq!(entries[1].total_response_time, 0.0);
        assert_eq!(entries[1].average_response_time, None);
    }
}
