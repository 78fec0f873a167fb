//! WebSocket connection and message handling for players.
//!
//! A connection must identify itself with a `join` message before anything
//! else; the join both upserts the participation row and binds the socket
//! to that player for game fan-out. The connection registry is ephemeral:
//! dropping a socket never changes game state.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::player_key,
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::{elimination_service, game_service, lifecycle},
    state::{PlayerConnection, SharedState},
};

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Internal error type for WebSocket message handling.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// Message referenced a different identity than the connection joined as.
    #[error("message ignored: identity mismatch (expected {expected}, got {got})")]
    MismatchedIdentity {
        expected: String,
        got: String,
    },
    /// Error from persistence or game logic.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
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

    let initial_message = match tokio::time::timeout(JOIN_TIMEOUT, receiver.next()).await {
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
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match ClientMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse or validate player message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ClientMessage::Join { game_id, user_id } = inbound else {
        warn!("first message was not a join");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let snapshot = match game_service::join(&state, game_id, user_id.clone()).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(%game_id, user_id, error = %err, "websocket join rejected");
            let _ = send_message(
                &outbound_tx,
                &ServerMessage::Error {
                    message: err.to_string(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let player_id = player_key(game_id, &user_id);
    state.connections().insert(
        player_id.clone(),
        PlayerConnection {
            player_id: player_id.clone(),
            game_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(%game_id, user_id, "player connected");

    if send_message(&outbound_tx, &ServerMessage::Joined { game: snapshot }).is_err() {
        info!(%game_id, user_id, "connection closed during join ack, terminating");
        state.connections().remove(&player_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let parsed = match ClientMessage::from_json_str(&text) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!(user_id, error = %err, "failed to parse or validate player message");
                        continue;
                    }
                };

                let result = dispatch(&state, game_id, &user_id, parsed, &outbound_tx).await;
                if let Err(err) = result {
                    warn!(user_id, error = %err, "error while handling player message");
                    if matches!(err, SocketError::ConnectionClosed) {
                        break;
                    }
                    let _ = send_message(
                        &outbound_tx,
                        &ServerMessage::Error {
                            message: err.to_string(),
                        },
                    );
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(user_id, "player closed connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(&player_id);
    info!(%game_id, user_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Route a parsed message from an identified connection to the game logic.
async fn dispatch(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
    message: ClientMessage,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), SocketError> {
    match message {
        ClientMessage::Join {
            game_id: other_game,
            user_id: other_user,
        } => {
            if other_game != game_id || other_user != user_id {
                return Err(SocketError::MismatchedIdentity {
                    expected: player_key(game_id, user_id),
                    got: player_key(other_game, &other_user),
                });
            }
            // Re-join before start resets the player's row.
            let snapshot = game_service::join(state, game_id, user_id.to_string()).await?;
            send_message(outbound_tx, &ServerMessage::Joined { game: snapshot })
        }
        ClientMessage::Eliminate {
            game_id: other_game,
            user_id: other_user,
        } => {
            if other_game != game_id || other_user != user_id {
                return Err(SocketError::MismatchedIdentity {
                    expected: player_key(game_id, user_id),
                    got: player_key(other_game, &other_user),
                });
            }
            // Outcomes reach every watcher through the game broadcasts.
            elimination_service::eliminate(state, game_id, user_id).await?;
            Ok(())
        }
        ClientMessage::Start {
            game_id: other_game,
        } => {
            lifecycle::start_game(state, other_game).await?;
            Ok(())
        }
        ClientMessage::Unknown => {
            warn!(user_id, "ignoring unknown message type");
            Ok(())
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failure is a permanent error (a bug, not worth retrying)
/// and is only logged; a closed writer channel is reported so the caller
/// can terminate the connection.
fn send_message(
    tx: &mpsc::UnboundedSender<Message>,
    message: &ServerMessage,
) -> Result<(), SocketError> {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

/// Push `message` to every live connection watching `game_id`, dropping
/// connections whose writer has gone away.
pub fn broadcast_to_game(state: &SharedState, game_id: Uuid, message: &ServerMessage) {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize broadcast message `{message:?}`");
            return;
        }
    };

    let mut dead = Vec::new();
    for connection in state.connections().iter() {
        if connection.game_id != game_id {
            continue;
        }
        if connection
            .tx
            .send(Message::Text(payload.clone().into()))
            .is_err()
        {
            dead.push(connection.player_id.clone());
        }
    }
    for player_id in dead {
        state.connections().remove(&player_id);
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
