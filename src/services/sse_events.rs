//! Outbound notifications for game and player mutations.
//!
//! Every broadcast is fire-and-forget: a failure to notify never rolls back
//! or blocks the state transition that triggered it. Each event goes to the
//! public SSE stream and is mirrored to the WebSocket connections watching
//! the same game.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{GameEntity, HolderTally, PlayerEntity},
    dto::{
        sse::{GameCreatedEvent, GameOverEvent, GameStartedEvent, PlayerUpdateEvent, ServerEvent},
        ws::ServerMessage,
    },
    services::websocket_service,
    state::SharedState,
};

const EVENT_GAME_CREATED: &str = "game.created";
const EVENT_GAME_STARTED: &str = "game.started";
const EVENT_PLAYER_UPDATE: &str = "player.update";
const EVENT_GAME_OVER: &str = "game.over";

/// Broadcast the creation of a new scheduled game.
pub fn broadcast_game_created(state: &SharedState, game: &GameEntity) {
    let payload = GameCreatedEvent::from(game);
    send_public_event(state, EVENT_GAME_CREATED, &payload);
}

/// Broadcast that a game transitioned into `RUNNING`.
pub fn broadcast_game_started(state: &SharedState, game_id: Uuid) {
    let payload = GameStartedEvent { game_id };
    send_public_event(state, EVENT_GAME_STARTED, &payload);
    websocket_service::broadcast_to_game(state, game_id, &ServerMessage::GameStarted { game_id });
}

/// Broadcast the holder tally after a join or an elimination.
pub fn broadcast_player_update(state: &SharedState, game_id: Uuid, tally: HolderTally) {
    let payload = PlayerUpdateEvent {
        game_id,
        holding: tally.holding,
        total: tally.total,
    };
    send_public_event(state, EVENT_PLAYER_UPDATE, &payload);
    websocket_service::broadcast_to_game(
        state,
        game_id,
        &ServerMessage::PlayerUpdate {
            game_id,
            holding: tally.holding,
            total: tally.total,
        },
    );
}

/// Broadcast the end of a game, with the promoted winner when there is one.
pub fn broadcast_game_over(state: &SharedState, game_id: Uuid, winner: Option<&PlayerEntity>) {
    let payload = GameOverEvent {
        game_id,
        winner_id: winner.map(|player| player.id.clone()),
        winner_user_id: winner.map(|player| player.user_id.clone()),
    };
    send_public_event(state, EVENT_GAME_OVER, &payload);
    websocket_service::broadcast_to_game(
        state,
        game_id,
        &ServerMessage::GameOver {
            game_id,
            winner_id: winner.map(|player| player.id.clone()),
            winner_user_id: winner.map(|player| player.user_id.clone()),
        },
    );
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}
