use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Dispatched payload carried across the SSE channel.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized JSON data field.
    pub data: String,
}

impl ServerEvent {
    /// Build an event from a pre-rendered data string.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Initial metadata sent to an SSE client when it connects.
#[derive(Debug, Serialize, ToSchema)]
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

/// Broadcast when a new daily game row is created.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameCreatedEvent {
    /// The freshly created game.
    pub game_id: Uuid,
    /// RFC3339 instant the game is due to start.
    pub scheduled_at: String,
}

impl From<&crate::dao::models::GameEntity> for GameCreatedEvent {
    fn from(game: &crate::dao::models::GameEntity) -> Self {
        Self {
            game_id: game.id,
            scheduled_at: super::format_system_time(game.scheduled_at),
        }
    }
}

/// Broadcast when a game transitions into `RUNNING`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameStartedEvent {
    /// The started game.
    pub game_id: Uuid,
}

/// Broadcast whenever a game's holder tally changes (joins and releases).
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerUpdateEvent {
    /// The game the tally belongs to.
    pub game_id: Uuid,
    /// Players still holding.
    pub holding: u64,
    /// Everyone who ever joined.
    pub total: u64,
}

/// Broadcast exactly once when a game finishes.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameOverEvent {
    /// The finished game.
    pub game_id: Uuid,
    /// Winner's player row id; `None` when everyone released.
    pub winner_id: Option<String>,
    /// Winner's stable client identity; `None` when everyone released.
    pub winner_user_id: Option<String>,
}
