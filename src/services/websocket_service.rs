//! WebSocket connection lifecycles for screen and player sockets.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use time::OffsetDateTime;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    dto::{
        events::ErrorEvent,
        parse_offset_datetime,
        ws::{PlayerCommand, ScreenCommand, normalize_answer},
    },
    error::ServiceError,
    services::{fanout, room_service, scheduler},
    state::{SharedState, question::Question, room::ClientConnection},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for a display (screen) WebSocket connection.
pub async fn handle_screen_socket(state: SharedState, socket: WebSocket, room_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection = ClientConnection {
        tx: outbound_tx.clone(),
    };
    if let Err(err) = room_service::connect_screen(&state, &room_id, connection).await {
        warn!(room = %room_id, error = %err, "rejecting screen connection");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }
    info!(room = %room_id, "screen connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ScreenCommand>(&text) {
                Ok(command) => {
                    if let Err(err) = dispatch_screen_command(&state, &room_id, command).await {
                        warn!(room = %room_id, error = %err, "screen command failed");
                        fanout::send_event(
                            &outbound_tx,
                            fanout::EVENT_ERROR,
                            &ErrorEvent {
                                message: err.to_string(),
                            },
                        );
                    }
                }
                Err(err) => {
                    warn!(room = %room_id, error = %err, "failed to parse screen command");
                    fanout::send_event(
                        &outbound_tx,
                        fanout::EVENT_ERROR,
                        &ErrorEvent {
                            message: "unrecognized command".to_string(),
                        },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(room = %room_id, "screen closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(room = %room_id, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::disconnect_screen(&state, &room_id).await;
    info!(room = %room_id, "screen disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Execute one screen command, surfacing failures to the caller.
async fn dispatch_screen_command(
    state: &SharedState,
    room_id: &str,
    command: ScreenCommand,
) -> Result<(), ServiceError> {
    match command {
        ScreenCommand::StartGame { questions } => {
            // A manual start supersedes any pending auto-start.
            scheduler::cancel_auto_start(state, room_id, "screen_manual_start", Some("manual_start"))
                .await?;
            let questions: Vec<Question> = match questions {
                Some(list) => list.into_iter().map(Into::into).collect(),
                None => {
                    let handle = state.rooms().require(room_id)?;
                    let room = handle.lock().await;
                    room.questions.clone()
                }
            };
            room_service::start_game(state, room_id, questions).await
        }
        ScreenCommand::ShowQuestion => room_service::show_next_question(state, room_id).await,
        ScreenCommand::ScheduleAutoStart {
            start_at,
            delay,
            origin,
        } => {
            let origin = origin.unwrap_or_else(|| "screen".to_string());
            let target = resolve_start_at(start_at.as_deref(), delay)?;
            scheduler::schedule_auto_start(state, room_id, target, &origin).await
        }
        ScreenCommand::CancelAutoStart { origin, reason } => {
            scheduler::cancel_auto_start(
                state,
                room_id,
                origin.as_deref().unwrap_or("screen"),
                reason.as_deref(),
            )
            .await
        }
    }
}

/// Resolve an explicit auto-start request into a target time.
///
/// An RFC 3339 `start_at` wins when it parses; otherwise the integer delay
/// is used. A request carrying neither, or a negative delay, is a scheduling
/// failure reported to the caller rather than silently defaulted.
fn resolve_start_at(
    start_at: Option<&str>,
    delay: Option<i64>,
) -> Result<OffsetDateTime, ServiceError> {
    if let Some(raw) = start_at {
        if let Some(parsed) = parse_offset_datetime(raw) {
            return Ok(parsed);
        }
    }
    let Some(delay) = delay else {
        return Err(ServiceError::InvalidInput(
            "auto-start request carries no usable start time".into(),
        ));
    };
    if delay < 0 {
        return Err(ServiceError::InvalidInput(
            "auto-start delay must not be negative".into(),
        ));
    }
    Ok(OffsetDateTime::now_utc() + time::Duration::seconds(delay))
}

/// Handle the full lifecycle for a player WebSocket connection.
///
/// The first frame must be a `join` command; afterwards the socket only
/// submits answers. Submission failures are logged, never echoed back.
pub async fn handle_player_socket(state: SharedState, socket: WebSocket, room_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(room = %room_id, error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!(room = %room_id, "player join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let player_name = match serde_json::from_str::<PlayerCommand>(&initial_message) {
        Ok(PlayerCommand::Join { player }) => player,
        Ok(_) => {
            warn!(room = %room_id, "first player message was not a join");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(room = %room_id, error = %err, "failed to parse player message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let connection = ClientConnection {
        tx: outbound_tx.clone(),
    };
    if let Err(err) =
        room_service::connect_player(&state, &room_id, &player_name, connection).await
    {
        warn!(room = %room_id, player = %player_name, error = %err, "rejecting player connection");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<PlayerCommand>(&text) {
                Ok(PlayerCommand::Answer { answer }) => {
                    let answer = normalize_answer(&answer);
                    if let Err(err) =
                        room_service::submit_answer(&state, &room_id, &player_name, answer).await
                    {
                        warn!(room = %room_id, player = %player_name, error = %err, "answer rejected");
                    }
                }
                Ok(PlayerCommand::Join { .. }) => {
                    warn!(room = %room_id, player = %player_name, "ignoring duplicate join");
                }
                Err(err) => {
                    warn!(room = %room_id, player = %player_name, error = %err, "failed to parse player message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(room = %room_id, player = %player_name, "player closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(room = %room_id, player = %player_name, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::disconnect_player(&state, &room_id, &player_name).await;
    info!(room = %room_id, player = %player_name, "player disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from a socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
