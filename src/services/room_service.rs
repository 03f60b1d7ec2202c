//! Room lifecycle and the question phase controller.
//!
//! All transitions for a room run under its mutex, so events are logged and
//! broadcast in transition order. The question timeout lives in the room's
//! [`TimerSlot`](crate::state::room::TimerSlot); every transition that
//! supersedes it bumps the slot generation, and a timeout that fires after
//! being superseded exits without side effects.

use futures::future::BoxFuture;
use rand::Rng;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    dto::{
        events::{
            AnswerResult, PlayerJoinedEvent, QuestionView, ShowFinalEvent, ShowQuestionEvent,
            ShowResultsEvent,
        },
        format_offset_datetime,
        room::{AutoStartSummary, CreateRoomRequest, RoomSummary},
    },
    error::ServiceError,
    services::{fanout, scheduler, scoring},
    state::{
        SharedState,
        question::Question,
        registry::RoomHandle,
        room::{ClientConnection, Room},
    },
};

const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random uppercase alphanumeric room code.
pub fn generate_room_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ROOM_CODE_CHARSET[rng.random_range(0..ROOM_CODE_CHARSET.len())] as char)
        .collect()
}

/// Open a new room, optionally scheduling an automatic start.
///
/// Creating a room under an existing code replaces the old room wholesale.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomSummary, ServiceError> {
    let CreateRoomRequest {
        room_id,
        quiz_id,
        questions,
        auto_start_delay,
    } = request;

    if auto_start_delay.is_some_and(|delay| delay < 0) {
        return Err(ServiceError::InvalidInput(
            "auto-start delay must not be negative".into(),
        ));
    }

    let code = match room_id {
        Some(code) if !code.trim().is_empty() => code,
        _ => generate_room_code(state.config().room_code_length()),
    };

    let questions: Vec<Question> = questions.into_iter().map(Into::into).collect();
    let question_count = questions.len();

    let handle = state.rooms().create_room(&code, quiz_id);
    handle.lock().await.questions = questions;
    info!(room = %code, quiz = ?quiz_id, questions = question_count, "room created");

    let auto_start = match auto_start_delay {
        Some(delay) => {
            let start_at = OffsetDateTime::now_utc() + time::Duration::seconds(delay);
            scheduler::schedule_auto_start(state, &code, start_at, "create_room").await?;
            Some(AutoStartSummary {
                scheduled_at: format_offset_datetime(start_at),
                delay: delay as f64,
                origin: "create_room".to_string(),
            })
        }
        None => None,
    };

    Ok(RoomSummary {
        room_id: code,
        quiz_id,
        question_count,
        auto_start,
    })
}

/// Register a player in a room, creating the record on first join.
///
/// Re-joining under the same name is a no-op and keeps existing statistics.
pub async fn add_player(
    state: &SharedState,
    room_id: &str,
    player_name: &str,
) -> Result<(), ServiceError> {
    let name = player_name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput(
            "player name must not be empty".into(),
        ));
    }
    let handle = state.rooms().require(room_id)?;
    let mut room = handle.lock().await;
    room.ensure_player(name);
    Ok(())
}

/// Attach the display socket, replaying the room's event history to it first.
pub async fn connect_screen(
    state: &SharedState,
    room_id: &str,
    connection: ClientConnection,
) -> Result<(), ServiceError> {
    let handle = state.rooms().require(room_id)?;
    let mut room = handle.lock().await;
    fanout::replay(&room, &connection);
    room.screen = Some(connection);
    Ok(())
}

/// Detach the display socket, if any.
pub async fn disconnect_screen(state: &SharedState, room_id: &str) {
    let Some(handle) = state.rooms().get_room(room_id) else {
        return;
    };
    handle.lock().await.screen = None;
}

/// Attach a player socket: register the player, replay the event history to
/// the socket, then announce the join to the whole room.
pub async fn connect_player(
    state: &SharedState,
    room_id: &str,
    player_name: &str,
    connection: ClientConnection,
) -> Result<(), ServiceError> {
    let name = player_name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput(
            "player name must not be empty".into(),
        ));
    }
    let handle = state.rooms().require(room_id)?;
    let mut room = handle.lock().await;
    let room = &mut *room;

    room.ensure_player(name);
    fanout::replay(room, &connection);
    room.sockets.insert(name.to_string(), connection);

    let mut players: Vec<String> = room.players.keys().cloned().collect();
    players.sort();
    let payload = PlayerJoinedEvent {
        player: name.to_string(),
        players,
    };
    fanout::broadcast_payload(room, fanout::EVENT_PLAYER_JOINED, &payload);
    info!(room = %room.code, player = %name, "player joined");
    Ok(())
}

/// Detach a player socket; the player record itself stays registered.
pub async fn disconnect_player(state: &SharedState, room_id: &str, player_name: &str) {
    let Some(handle) = state.rooms().get_room(room_id) else {
        return;
    };
    handle.lock().await.sockets.shift_remove(player_name);
}

/// Start (or restart) the game with the given ordered question list.
pub async fn start_game(
    state: &SharedState,
    room_id: &str,
    questions: Vec<Question>,
) -> Result<(), ServiceError> {
    if questions.is_empty() {
        return Err(ServiceError::InvalidInput(
            "a game requires at least one question".into(),
        ));
    }
    let handle = state.rooms().require(room_id)?;
    let mut room = handle.lock().await;
    start_game_locked(state, &handle, &mut room, questions).await;
    Ok(())
}

/// Start the game on an already-locked room.
///
/// Also the entry point for a firing auto-start task, which must start the
/// game in the same lock acquisition as its generation check.
pub(crate) async fn start_game_locked(
    state: &SharedState,
    handle: &RoomHandle,
    room: &mut Room,
    questions: Vec<Question>,
) {
    room.question_timer.supersede();
    room.questions = questions;
    room.current_question_index = None;
    room.answers.clear();
    room.events.clear();
    room.question_started_at = None;
    room.question_duration = None;
    for player in room.players.values_mut() {
        player.reset_for_game();
    }
    info!(room = %room.code, questions = room.questions.len(), "game started");
    advance_question(state, handle, room).await;
}

/// Manually advance to the next question, skipping any results transition.
pub async fn show_next_question(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let handle = state.rooms().require(room_id)?;
    let mut room = handle.lock().await;
    advance_question(state, &handle, &mut room).await;
    Ok(())
}

/// Record a player's answer for the active question.
///
/// Unknown rooms and unregistered players are caller misuse and reported as
/// errors. Answers that arrive before a question starts, after the game
/// finished, or after the player already answered are expected races and
/// absorbed silently.
pub async fn submit_answer(
    state: &SharedState,
    room_id: &str,
    player_name: &str,
    answer: Option<String>,
) -> Result<(), ServiceError> {
    let handle = state.rooms().require(room_id)?;
    let mut room = handle.lock().await;
    let room = &mut *room;

    let Some(player) = room.players.get_mut(player_name) else {
        return Err(ServiceError::NotFound(format!(
            "player `{player_name}` is not registered in room `{room_id}`"
        )));
    };

    let Some(started_at) = room.question_started_at else {
        return Ok(());
    };
    let Some(index) = room.current_question_index else {
        return Ok(());
    };
    if index >= room.questions.len() {
        return Ok(());
    }
    if player.answered {
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    let mut response_time = (now - started_at).as_seconds_f64().max(0.0);
    if let Some(duration) = room.question_duration {
        response_time = response_time.min(duration as f64);
    }
    player.answered = true;
    player.last_answered_at = Some(now);
    player.last_response_time = Some(response_time);
    player.record_response_time(response_time);
    room.answers.insert(player_name.to_string(), answer);

    if room.all_answered() {
        // Quorum reached: the pending timeout must never fire for this
        // question.
        room.question_timer.supersede();
        finish_question(state, &handle, room).await;
    }
    Ok(())
}

/// Close the active question: backfill absent answers, score, broadcast
/// results, and advance.
async fn finish_question(state: &SharedState, handle: &RoomHandle, room: &mut Room) {
    let Some(question) = room.current_question() else {
        return;
    };
    let question_id = question.id;
    let correct_answer = question.correct_option.clone();
    let weight = scoring::question_weight(question);

    let mut results = Vec::with_capacity(room.players.len());
    {
        let Room {
            players, answers, ..
        } = room;
        for (name, player) in players.iter_mut() {
            if !answers.contains_key(name) {
                answers.insert(name.clone(), None);
                if !player.answered {
                    player.last_response_time = None;
                }
            }
            let answer = answers.get(name).cloned().flatten();
            let is_correct = scoring::is_correct_answer(answer.as_deref(), correct_answer.as_deref());
            if is_correct {
                player.score = player.score.saturating_add(weight);
            }
            results.push(AnswerResult {
                player: name.clone(),
                answer,
                is_correct,
                score: player.score,
                answered: player.answered,
                response_time: player.last_response_time,
            });
        }
    }

    let payload = ShowResultsEvent {
        question_id,
        correct_answer,
        results,
        scoreboard: scoring::build_scoreboard(&room.players),
        question_started_at: room.question_started_at.map(format_offset_datetime),
        question_duration: room.question_duration,
        server_time: format_offset_datetime(OffsetDateTime::now_utc()),
    };
    fanout::broadcast_payload(room, fanout::EVENT_SHOW_RESULTS, &payload);

    advance_question(state, handle, room).await;
}

/// Move the phase pointer forward and open the next question, or finish the
/// game when the list is exhausted.
///
/// Boxed because the question-timeout task it spawns eventually awaits this
/// function again for the following question.
fn advance_question<'a>(
    state: &'a SharedState,
    handle: &'a RoomHandle,
    room: &'a mut Room,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let generation = room.question_timer.supersede();
        let next_index = room.current_question_index.map_or(0, |index| index + 1);
        room.current_question_index = Some(next_index);
        room.answers.clear();
        for player in room.players.values_mut() {
            player.reset_for_question();
        }

        if next_index >= room.questions.len() {
            room.question_started_at = None;
            room.question_duration = None;
            let payload = ShowFinalEvent {
                scoreboard: scoring::build_scoreboard(&room.players),
                server_time: format_offset_datetime(OffsetDateTime::now_utc()),
            };
            fanout::broadcast_payload(room, fanout::EVENT_SHOW_FINAL, &payload);
            info!(room = %room.code, "game finished");
            return;
        }

        let question = &room.questions[next_index];
        let duration = question.resolve_duration(state.config().default_question_duration());
        let started_at = OffsetDateTime::now_utc();
        room.question_duration = Some(duration);
        room.question_started_at = Some(started_at);

        let payload = ShowQuestionEvent {
            question: QuestionView::from(&room.questions[next_index]),
            question_number: next_index + 1,
            total_questions: room.questions.len(),
            question_started_at: Some(format_offset_datetime(started_at)),
            question_duration: Some(duration),
            server_time: format_offset_datetime(OffsetDateTime::now_utc()),
        };
        fanout::broadcast_payload(room, fanout::EVENT_SHOW_QUESTION, &payload);

        if duration > 0 {
            let task = spawn_question_timeout(state.clone(), handle.clone(), generation, duration);
            room.question_timer.arm(generation, task);
        }
    })
}

/// Spawn the timeout task that closes a question after its answer window.
fn spawn_question_timeout(
    state: SharedState,
    handle: RoomHandle,
    generation: u64,
    duration: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(duration)).await;
        let mut room = handle.lock().await;
        let room = &mut *room;
        if !room.question_timer.claim(generation) {
            // Superseded by an all-answered quorum or a restart.
            return;
        }

        let Room {
            players, answers, ..
        } = room;
        for (name, player) in players.iter_mut() {
            if !player.answered {
                answers.entry(name.clone()).or_insert(None);
                player.answered = true;
                player.last_response_time = None;
            }
        }
        warn!(room = %room.code, "question timed out");
        finish_question(&state, &handle, room).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::{
        config::AppConfig,
        services::scoring::Score,
        state::{AppState, question::RawNumber},
    };

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default())
    }

    fn question(id: i64, correct: &str, timer: i64) -> Question {
        Question {
            id,
            text: format!("question {id}"),
            options: vec!["A".into(), "B".into()],
            correct_option: Some(correct.into()),
            score: None,
            timer: Some(RawNumber::Int(timer)),
            time_limit: None,
            duration: None,
            question_duration: None,
        }
    }

    async fn room_with_players(state: &SharedState, code: &str, names: &[&str]) -> RoomHandle {
        let handle = state.rooms().create_room(code, None);
        for name in names {
            add_player(state, code, name).await.unwrap();
        }
        handle
    }

    fn event_names(room: &Room) -> Vec<&str> {
        room.events.iter().map(|record| record.event.as_str()).collect()
    }

    #[tokio::test]
    async fn start_game_resets_every_player() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM10", &["Alice", "Bob"]).await;
        {
            let mut room = handle.lock().await;
            let player = room.players.get_mut("Alice").unwrap();
            player.score = Score::ONE;
            player.answered = true;
            player.record_response_time(3.0);
        }

        start_game(&state, "ROOM10", vec![question(1, "A", 30)])
            .await
            .unwrap();

        let room = handle.lock().await;
        for player in room.players.values() {
            assert_eq!(player.score, Score::ZERO);
            assert!(!player.answered);
            assert!(player.response_times.is_empty());
        }
        assert_eq!(room.current_question_index, Some(0));
        assert_eq!(event_names(&room), vec!["show_question"]);
        assert!(room.question_timer.is_armed());
    }

    #[tokio::test]
    async fn starting_without_questions_is_an_error() {
        let state = test_state();
        room_with_players(&state, "ROOM11", &["Alice"]).await;
        let err = start_game(&state, "ROOM11", Vec::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn answers_before_any_question_are_ignored() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM12", &["Alice"]).await;

        submit_answer(&state, "ROOM12", "Alice", Some("A".into()))
            .await
            .unwrap();

        let room = handle.lock().await;
        assert!(room.answers.is_empty());
        assert!(room.players["Alice"].response_times.is_empty());
        assert!(!room.players["Alice"].answered);
    }

    #[tokio::test]
    async fn unknown_rooms_and_players_are_reported() {
        let state = test_state();
        room_with_players(&state, "ROOM13", &["Alice"]).await;

        let err = submit_answer(&state, "NOPE", "Alice", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = submit_answer(&state, "ROOM13", "Ghost", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn response_times_are_clamped_to_the_answer_window() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM14", &["Alice", "Bob"]).await;
        start_game(
            &state,
            "ROOM14",
            vec![question(1, "A", 20), question(2, "A", 20)],
        )
        .await
        .unwrap();

        // An answer arriving absurdly late records exactly the window.
        handle.lock().await.question_started_at =
            Some(OffsetDateTime::now_utc() - time::Duration::seconds(1000));
        submit_answer(&state, "ROOM14", "Alice", Some("A".into()))
            .await
            .unwrap();

        // A clock skew into the future clamps at zero.
        handle.lock().await.question_started_at =
            Some(OffsetDateTime::now_utc() + time::Duration::seconds(1000));
        submit_answer(&state, "ROOM14", "Bob", Some("A".into()))
            .await
            .unwrap();

        let room = handle.lock().await;
        assert_eq!(room.players["Alice"].response_times, vec![20.0]);
        assert_eq!(room.players["Bob"].response_times, vec![0.0]);
    }

    #[tokio::test]
    async fn duplicate_answers_are_absorbed() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM15", &["Alice", "Bob"]).await;
        start_game(&state, "ROOM15", vec![question(1, "A", 30)])
            .await
            .unwrap();

        submit_answer(&state, "ROOM15", "Alice", Some("A".into()))
            .await
            .unwrap();
        submit_answer(&state, "ROOM15", "Alice", Some("B".into()))
            .await
            .unwrap();

        let room = handle.lock().await;
        assert_eq!(room.answers["Alice"], Some("A".to_string()));
        assert_eq!(room.players["Alice"].response_times.len(), 1);
    }

    #[tokio::test]
    async fn quorum_supersedes_the_timeout_and_advances() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM16", &["Alice", "Bob"]).await;
        start_game(
            &state,
            "ROOM16",
            vec![question(1, "A", 30), question(2, "B", 30)],
        )
        .await
        .unwrap();

        submit_answer(&state, "ROOM16", "Alice", Some("A".into()))
            .await
            .unwrap();
        submit_answer(&state, "ROOM16", "Bob", Some("B".into()))
            .await
            .unwrap();

        let room = handle.lock().await;
        assert_eq!(room.current_question_index, Some(1));
        assert_eq!(
            event_names(&room),
            vec!["show_question", "show_results", "show_question"]
        );
        assert!(room.question_timer.is_armed(), "next question gets its own timer");

        let results = &room.events[1].payload["results"];
        assert_eq!(results[0]["player"], "Alice");
        assert_eq!(results[0]["is_correct"], serde_json::json!(true));
        assert_eq!(results[0]["score"], serde_json::json!(1));
        assert_eq!(results[1]["player"], "Bob");
        assert_eq!(results[1]["is_correct"], serde_json::json!(false));
        assert_eq!(results[1]["score"], serde_json::json!(0));
    }

    #[tokio::test]
    async fn weighted_scores_accumulate_decimally() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM17", &["Alice"]).await;
        let mut weighted = question(1, "A", 30);
        weighted.score = Some(RawNumber::Text("2,5".into()));
        start_game(&state, "ROOM17", vec![weighted]).await.unwrap();

        submit_answer(&state, "ROOM17", "Alice", Some("A".into()))
            .await
            .unwrap();

        let room = handle.lock().await;
        assert_eq!(
            room.players["Alice"].score,
            Score::parse(&RawNumber::Text("2.5".into())).unwrap()
        );
        // Single player quorum runs straight through to the final scoreboard.
        assert_eq!(
            event_names(&room),
            vec!["show_question", "show_results", "show_final"]
        );
        let scoreboard = &room.events[2].payload["scoreboard"];
        assert_eq!(scoreboard[0]["score"], serde_json::json!(2.5));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_defaults_unanswered_players_and_drops_late_answers() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM18", &["Alice", "Bob"]).await;
        start_game(&state, "ROOM18", vec![question(1, "A", 1)])
            .await
            .unwrap();

        submit_answer(&state, "ROOM18", "Alice", Some("A".into()))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        {
            let room = handle.lock().await;
            assert_eq!(room.current_question_index, Some(1), "game finished");
            assert_eq!(
                event_names(&room),
                vec!["show_question", "show_results", "show_final"]
            );
            let results = &room.events[1].payload["results"];
            assert_eq!(results[1]["player"], "Bob");
            assert_eq!(results[1]["answer"], serde_json::Value::Null);
            assert_eq!(results[1]["answered"], serde_json::json!(true));
            assert!(room.players["Bob"].response_times.is_empty());
        }

        // A late answer after the timeout is absorbed without side effects.
        submit_answer(&state, "ROOM18", "Bob", Some("A".into()))
            .await
            .unwrap();
        let room = handle.lock().await;
        assert!(room.players["Bob"].response_times.is_empty());
        assert_eq!(room.players["Bob"].score, Score::ZERO);
        assert_eq!(room.events.len(), 3, "no further events");
    }

    #[tokio::test]
    async fn manual_advance_skips_the_results_transition() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM19", &["Alice"]).await;
        start_game(
            &state,
            "ROOM19",
            vec![question(1, "A", 30), question(2, "B", 30)],
        )
        .await
        .unwrap();

        show_next_question(&state, "ROOM19").await.unwrap();

        let room = handle.lock().await;
        assert_eq!(room.current_question_index, Some(1));
        assert_eq!(event_names(&room), vec!["show_question", "show_question"]);
    }

    #[tokio::test]
    async fn connecting_a_player_replays_history_before_the_join_event() {
        let state = test_state();
        let handle = room_with_players(&state, "ROOM20", &["Alice"]).await;
        start_game(&state, "ROOM20", vec![question(1, "A", 30)])
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        connect_player(&state, "ROOM20", "Bob", ClientConnection { tx })
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Ok(axum::extract::ws::Message::Text(text)) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            received.push(value["event"].as_str().unwrap().to_string());
        }
        assert_eq!(received, vec!["show_question", "player_joined"]);

        let room = handle.lock().await;
        assert_eq!(event_names(&room), vec!["show_question", "player_joined"]);
        assert_eq!(
            room.events[1].payload["players"],
            serde_json::json!(["Alice", "Bob"])
        );
    }
}
