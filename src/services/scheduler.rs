//! Cancellable delayed-start scheduling for rooms.
//!
//! A room holds at most one outstanding auto-start task. Scheduling again
//! supersedes the previous task, and a manual start cancels defensively
//! before taking over. The firing task checks its generation and starts the
//! game inside the same lock acquisition, so a manual start can never
//! interleave between the check and the start.

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    dto::{
        events::{AutoStartCancelledEvent, AutoStartScheduledEvent},
        format_offset_datetime,
    },
    error::ServiceError,
    services::{fanout, room_service},
    state::{SharedState, registry::RoomHandle},
};

/// Schedule the game to start automatically at `start_at`.
///
/// Replaces any previously scheduled auto-start. Target times in the past
/// fire immediately.
pub async fn schedule_auto_start(
    state: &SharedState,
    room_id: &str,
    start_at: OffsetDateTime,
    origin: &str,
) -> Result<(), ServiceError> {
    let handle = state.rooms().require(room_id)?;
    let mut room = handle.lock().await;
    let room = &mut *room;

    let generation = room.auto_start.supersede();
    let now = OffsetDateTime::now_utc();
    let delay = (start_at - now).max(time::Duration::ZERO);

    room.auto_start_at = Some(start_at);
    room.auto_start_origin = Some(origin.to_string());

    let payload = AutoStartScheduledEvent {
        scheduled_at: format_offset_datetime(start_at),
        delay: delay.as_seconds_f64(),
        origin: origin.to_string(),
        server_time: format_offset_datetime(now),
    };
    fanout::broadcast_payload(room, fanout::EVENT_AUTO_START_SCHEDULED, &payload);
    info!(room = %room.code, scheduled_at = %payload.scheduled_at, origin, "auto-start scheduled");

    let task = spawn_auto_start(state.clone(), handle.clone(), generation, delay.unsigned_abs());
    room.auto_start.arm(generation, task);
    Ok(())
}

/// Cancel any pending auto-start and announce the cancellation.
///
/// Safe to call when nothing is scheduled, which the manual-start path does
/// defensively.
pub async fn cancel_auto_start(
    state: &SharedState,
    room_id: &str,
    origin: &str,
    reason: Option<&str>,
) -> Result<(), ServiceError> {
    let handle = state.rooms().require(room_id)?;
    let mut room = handle.lock().await;
    let room = &mut *room;

    room.auto_start.supersede();
    let scheduled_at = room.auto_start_at.take();
    room.auto_start_origin = None;

    let payload = AutoStartCancelledEvent {
        scheduled_at: scheduled_at.map(format_offset_datetime),
        origin: origin.to_string(),
        reason: reason.map(str::to_string),
        server_time: format_offset_datetime(OffsetDateTime::now_utc()),
    };
    fanout::broadcast_payload(room, fanout::EVENT_AUTO_START_CANCELLED, &payload);
    info!(room = %room.code, origin, reason = ?reason, "auto-start cancelled");
    Ok(())
}

/// Spawn the task that sleeps until the scheduled time and starts the game.
fn spawn_auto_start(
    state: SharedState,
    handle: RoomHandle,
    generation: u64,
    delay: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let mut room = handle.lock().await;
        let room = &mut *room;
        if !room.auto_start.claim(generation) {
            // Superseded by a newer schedule or a cancellation.
            return;
        }
        room.auto_start_at = None;
        room.auto_start_origin = None;

        let questions = room.questions.clone();
        if questions.is_empty() {
            warn!(room = %room.code, "auto-start fired with no questions loaded");
            return;
        }
        info!(room = %room.code, "auto-start firing");
        room_service::start_game_locked(&state, &handle, room, questions).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        config::AppConfig,
        state::{
            AppState,
            question::{Question, RawNumber},
        },
    };

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default())
    }

    // Large timer keeps the started question's own timeout out of the
    // advancing test clock.
    fn question() -> Question {
        Question {
            id: 1,
            text: "sample question".into(),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_option: Some("A".into()),
            score: None,
            timer: Some(RawNumber::Int(3600)),
            time_limit: None,
            duration: None,
            question_duration: None,
        }
    }

    async fn seeded_room(state: &SharedState, code: &str) -> RoomHandle {
        let handle = state.rooms().create_room(code, Some(7));
        handle.lock().await.questions = vec![question()];
        handle
    }

    fn event_names(room: &crate::state::room::Room) -> Vec<&str> {
        room.events.iter().map(|record| record.event.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_then_cancel_never_starts() {
        let state = test_state();
        let handle = seeded_room(&state, "ROOM40").await;
        let start_at = OffsetDateTime::now_utc() + time::Duration::seconds(30);

        schedule_auto_start(&state, "ROOM40", start_at, "ui")
            .await
            .unwrap();
        {
            let room = handle.lock().await;
            assert!(room.auto_start.is_armed());
            assert_eq!(room.auto_start_at, Some(start_at));
            assert_eq!(room.auto_start_origin.as_deref(), Some("ui"));
            let payload = &room.events[0].payload;
            assert_eq!(payload["origin"], "ui");
            let delay = payload["delay"].as_f64().unwrap();
            assert!((29.0..=30.0).contains(&delay), "delay was {delay}");
        }

        cancel_auto_start(&state, "ROOM40", "manual", Some("changed_mind"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;

        let room = handle.lock().await;
        assert_eq!(room.current_question_index, None, "start must never fire");
        assert!(!room.auto_start.is_armed());
        assert_eq!(room.auto_start_at, None);
        assert_eq!(room.auto_start_origin, None);
        assert_eq!(
            event_names(&room),
            vec!["auto_start_scheduled", "auto_start_cancelled"]
        );
        let payload = &room.events[1].payload;
        assert_eq!(
            payload["scheduled_at"],
            serde_json::json!(format_offset_datetime(start_at))
        );
        assert_eq!(payload["reason"], "changed_mind");
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_supersedes_the_first_task() {
        let state = test_state();
        let handle = seeded_room(&state, "ROOM41").await;
        let now = OffsetDateTime::now_utc();

        schedule_auto_start(&state, "ROOM41", now + time::Duration::seconds(600), "first")
            .await
            .unwrap();
        schedule_auto_start(&state, "ROOM41", now + time::Duration::seconds(1), "second")
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        {
            let room = handle.lock().await;
            assert_eq!(room.current_question_index, Some(0), "second schedule fired");
            assert_eq!(event_names(&room), vec!["show_question"]);
        }

        // Long after the first schedule's target time, nothing else fires.
        tokio::time::sleep(std::time::Duration::from_secs(700)).await;
        let room = handle.lock().await;
        assert_eq!(event_names(&room), vec!["show_question"]);
    }

    #[tokio::test(start_paused = true)]
    async fn firing_clears_bookkeeping_and_starts_the_game() {
        let state = test_state();
        let handle = seeded_room(&state, "ROOM42").await;

        schedule_auto_start(&state, "ROOM42", OffsetDateTime::now_utc(), "scheduler")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        let room = handle.lock().await;
        assert_eq!(room.current_question_index, Some(0));
        assert_eq!(room.question_duration, Some(3600));
        assert!(room.question_started_at.is_some());
        assert_eq!(room.auto_start_at, None);
        assert_eq!(room.auto_start_origin, None);
        assert!(!room.auto_start.is_armed());
        // The fresh start wiped the log; only the new question remains.
        assert_eq!(event_names(&room), vec!["show_question"]);
        assert_eq!(room.events[0].payload["question_number"], 1);
    }

    #[tokio::test]
    async fn cancelling_with_nothing_scheduled_is_safe() {
        let state = test_state();
        let handle = seeded_room(&state, "ROOM43").await;

        cancel_auto_start(&state, "ROOM43", "screen_manual_start", Some("manual_start"))
            .await
            .unwrap();

        let room = handle.lock().await;
        assert_eq!(event_names(&room), vec!["auto_start_cancelled"]);
        assert!(
            room.events[0].payload.get("scheduled_at").is_none(),
            "no schedule to report"
        );
    }

    #[tokio::test]
    async fn unknown_rooms_are_reported() {
        let state = test_state();
        let err = schedule_auto_start(&state, "NOPE", OffsetDateTime::now_utc(), "ui")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
