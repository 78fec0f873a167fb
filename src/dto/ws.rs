use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{game::GameSnapshot, validation::validate_user_id};

/// Closed set of messages accepted from player WebSocket clients.
///
/// The first message on a connection must be `join`; it both upserts the
/// participation row and binds the connection to that identity.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter (or re-enter) a game as a holder.
    Join {
        /// Target game.
        game_id: Uuid,
        /// Stable identity of the joining client.
        user_id: String,
    },
    /// Report a release ("I let go").
    Eliminate {
        /// Target game.
        game_id: Uuid,
        /// Stable identity of the releasing client.
        user_id: String,
    },
    /// Trigger the `WAITING -> RUNNING` transition.
    Start {
        /// Target game.
        game_id: Uuid,
    },
    /// Any unrecognized message type; ignored with a warning.
    #[serde(other)]
    Unknown,
}

/// Failure to turn a WebSocket text frame into a [`ClientMessage`].
#[derive(Debug, Error)]
pub enum ClientMessageError {
    /// The frame was not valid JSON for any known variant.
    #[error("invalid message: {0}")]
    Parse(#[from] serde_json::Error),
    /// The embedded user id failed validation.
    #[error("invalid user id: {0}")]
    InvalidUserId(validator::ValidationError),
}

impl ClientMessage {
    /// Parse a text frame and validate any embedded user id.
    pub fn from_json_str(payload: &str) -> Result<Self, ClientMessageError> {
        let message: Self = serde_json::from_str(payload)?;
        match &message {
            ClientMessage::Join { user_id, .. } | ClientMessage::Eliminate { user_id, .. } => {
                validate_user_id(user_id).map_err(ClientMessageError::InvalidUserId)?;
            }
            ClientMessage::Start { .. } | ClientMessage::Unknown => {}
        }
        Ok(message)
    }
}

/// Closed set of messages pushed to player WebSocket clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges a successful join with the game snapshot.
    Joined {
        /// Snapshot after the join.
        game: GameSnapshot,
    },
    /// The holder tally changed.
    PlayerUpdate {
        /// The game the tally belongs to.
        game_id: Uuid,
        /// Players still holding.
        holding: u64,
        /// Everyone who ever joined.
        total: u64,
    },
    /// The game transitioned into `RUNNING`.
    GameStarted {
        /// The started game.
        game_id: Uuid,
    },
    /// The game finished.
    GameOver {
        /// The finished game.
        game_id: Uuid,
        /// Winner's player row id; `None` when everyone released.
        winner_id: Option<String>,
        /// Winner's stable client identity; `None` when everyone released.
        winner_user_id: Option<String>,
    },
    /// A request on this connection failed.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_message_parses_with_valid_user_id() {
        let game_id = Uuid::new_v4();
        let payload = format!(r#"{{"type":"join","game_id":"{game_id}","user_id":"visitor-1"}}"#);
        match ClientMessage::from_json_str(&payload).unwrap() {
            ClientMessage::Join {
                game_id: parsed,
                user_id,
            } => {
                assert_eq!(parsed, game_id);
                assert_eq!(user_id, "visitor-1");
            }
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn eliminate_message_rejects_invalid_user_id() {
        let game_id = Uuid::new_v4();
        let payload =
            format!(r#"{{"type":"eliminate","game_id":"{game_id}","user_id":"no spaces"}}"#);
        assert!(matches!(
            ClientMessage::from_json_str(&payload),
            Err(ClientMessageError::InvalidUserId(_))
        ));
    }

    #[test]
    fn unrecognized_type_maps_to_unknown() {
        let message = ClientMessage::from_json_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(message, ClientMessage::Unknown));
    }
}
