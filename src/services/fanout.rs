//! Event fanout: append to the room's replay log, then deliver to every
//! connected socket.

use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::state::room::{ClientConnection, EventRecord, Room};

/// Event name: a player joined the room.
pub const EVENT_PLAYER_JOINED: &str = "player_joined";
/// Event name: a question opened for answers.
pub const EVENT_SHOW_QUESTION: &str = "show_question";
/// Event name: a question closed and results are out.
pub const EVENT_SHOW_RESULTS: &str = "show_results";
/// Event name: the game finished.
pub const EVENT_SHOW_FINAL: &str = "show_final";
/// Event name: an automatic start was scheduled.
pub const EVENT_AUTO_START_SCHEDULED: &str = "auto_start_scheduled";
/// Event name: an automatic start was cancelled.
pub const EVENT_AUTO_START_CANCELLED: &str = "auto_start_cancelled";
/// Event name: command failure reported to the originating screen only.
pub const EVENT_ERROR: &str = "error";

/// Serialize `payload` and broadcast it under `event` to the whole room.
pub fn broadcast_payload<T: Serialize>(room: &mut Room, event: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => broadcast(room, event, value),
        Err(err) => warn!(room = %room.code, event, error = %err, "failed to serialize event payload"),
    }
}

/// Append an event to the room's replay log and deliver it to the screen and
/// every player socket.
///
/// The log append happens first so replay order always matches broadcast
/// order. A socket whose writer channel has closed is dropped from the room;
/// the failure never reaches the other recipients or the caller.
pub fn broadcast(room: &mut Room, event: &str, payload: serde_json::Value) {
    let record = EventRecord {
        event: event.to_string(),
        payload,
    };
    let message = envelope_message(&record);
    room.events.push(record);

    let Some(message) = message else { return };

    let screen_closed = room
        .screen
        .as_ref()
        .is_some_and(|screen| screen.tx.send(message.clone()).is_err());
    if screen_closed {
        warn!(room = %room.code, event, "screen socket closed during broadcast");
        room.screen = None;
    }

    let mut closed = Vec::new();
    for (name, connection) in &room.sockets {
        if connection.tx.send(message.clone()).is_err() {
            warn!(room = %room.code, player = %name, event, "player socket closed during broadcast");
            closed.push(name.clone());
        }
    }
    for name in closed {
        room.sockets.shift_remove(&name);
    }
}

/// Replay the room's full event history, in order, to one connection.
///
/// Called while the room lock is held, before the connection is installed,
/// so no concurrent broadcast can interleave with the history.
pub fn replay(room: &Room, connection: &ClientConnection) {
    for record in &room.events {
        let Some(message) = envelope_message(record) else {
            continue;
        };
        if connection.tx.send(message).is_err() {
            warn!(room = %room.code, "socket closed during event replay");
            break;
        }
    }
}

/// Send one event to a single socket, outside of any room log.
///
/// Used for the `error` event, which goes only to the originating screen.
pub fn send_event<T: Serialize>(tx: &mpsc::UnboundedSender<Message>, event: &str, payload: &T) {
    let record = match serde_json::to_value(payload) {
        Ok(value) => EventRecord {
            event: event.to_string(),
            payload: value,
        },
        Err(err) => {
            warn!(event, error = %err, "failed to serialize event payload");
            return;
        }
    };
    if let Some(message) = envelope_message(&record) {
        let _ = tx.send(message);
    }
}

fn envelope_message(record: &EventRecord) -> Option<Message> {
    match serde_json::to_string(record) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(err) => {
            warn!(event = %record.event, error = %err, "failed to serialize event envelope");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection() -> (ClientConnection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientConnection { tx }, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut received = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            received.push(serde_json::from_str(&text).unwrap());
        }
        received
    }

    #[tokio::test]
    async fn broadcast_logs_before_delivering() {
        let mut room = Room::new("ROOM01", None);
        let (screen, mut screen_rx) = connection();
        room.screen = Some(screen);
        let (player, mut player_rx) = connection();
        room.sockets.insert("Alice".to_string(), player);

        broadcast(&mut room, "show_question", json!({"question_number": 1}));

        assert_eq!(room.events.len(), 1);
        assert_eq!(room.events[0].event, "show_question");

        let expected = json!({"event": "show_question", "payload": {"question_number": 1}});
        assert_eq!(drain(&mut screen_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut player_rx), vec![expected]);
    }

    #[tokio::test]
    async fn closed_socket_is_skipped_without_affecting_others() {
        let mut room = Room::new("ROOM02", None);
        let (dead, dead_rx) = connection();
        drop(dead_rx);
        room.sockets.insert("Gone".to_string(), dead);
        let (alive, mut alive_rx) = connection();
        room.sockets.insert("Here".to_string(), alive);

        broadcast(&mut room, "player_joined", json!({"player": "Here"}));

        assert_eq!(drain(&mut alive_rx).len(), 1);
        assert!(!room.sockets.contains_key("Gone"));
        assert_eq!(room.events.len(), 1, "log keeps the event either way");
    }

    #[tokio::test]
    async fn replay_reproduces_the_exact_sequence() {
        let mut room = Room::new("ROOM03", None);
        broadcast(&mut room, "player_joined", json!({"player": "Alice"}));
        broadcast(&mut room, "show_question", json!({"question_number": 1}));
        broadcast(&mut room, "show_results", json!({"question_id": 9}));

        let (late, mut late_rx) = connection();
        replay(&room, &late);

        let received = drain(&mut late_rx);
        assert_eq!(received.len(), 3);
        let names: Vec<&str> = received
            .iter()
            .map(|value| value["event"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["player_joined", "show_question", "show_results"]);
        assert_eq!(received[2]["payload"], json!({"question_id": 9}));
    }
}
