use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a game. Monotonic: a `Finished` game never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// Scheduled but not yet started; players can join and re-join.
    Waiting,
    /// Accepting eliminations; the join window is closed.
    Running,
    /// Terminal. `winner_id` is set at most once, on this transition.
    Finished,
}

impl GameState {
    /// Wire/storage representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::Waiting => "WAITING",
            GameState::Running => "RUNNING",
            GameState::Finished => "FINISHED",
        }
    }
}

/// Per-game status of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    /// Actively pressing the button. Initial, and re-enterable before start.
    Holding,
    /// Released. Terminal within the game.
    Eliminated,
    /// Last holder of a contested game. Terminal.
    Winner,
}

impl PlayerStatus {
    /// Wire/storage representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Holding => "HOLDING",
            PlayerStatus::Eliminated => "ELIMINATED",
            PlayerStatus::Winner => "WINNER",
        }
    }
}

/// Game row persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// When the game is due to start.
    pub scheduled_at: SystemTime,
    /// Current lifecycle state.
    pub state: GameState,
    /// Player row id of the winner, set only on the transition into `Finished`.
    pub winner_id: Option<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Refreshed on every state change.
    pub updated_at: SystemTime,
}

impl GameEntity {
    /// Build a fresh `Waiting` game due at `scheduled_at`.
    pub fn scheduled(id: Uuid, scheduled_at: SystemTime, now: SystemTime) -> Self {
        Self {
            id,
            scheduled_at,
            state: GameState::Waiting,
            winner_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Player participation row, one per `(game, user)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Deterministic composite key, see [`player_key`].
    pub id: String,
    /// Owning game.
    pub game_id: Uuid,
    /// Stable identity of the human/client.
    pub user_id: String,
    /// Current status within the game.
    pub status: PlayerStatus,
    /// Set on first join; survives re-joins.
    pub joined_at: SystemTime,
    /// Set exactly once, on the transition into `Eliminated`.
    pub eliminated_at: Option<SystemTime>,
}

impl PlayerEntity {
    /// Build a fresh `Holding` row for `user_id` in `game_id`.
    pub fn holding(game_id: Uuid, user_id: String, now: SystemTime) -> Self {
        Self {
            id: player_key(game_id, &user_id),
            game_id,
            user_id,
            status: PlayerStatus::Holding,
            joined_at: now,
            eliminated_at: None,
        }
    }
}

/// Deterministic player row key. The game id prefix guarantees at most one
/// participation row per user per game, and makes joins upsert-safe.
pub fn player_key(game_id: Uuid, user_id: &str) -> String {
    format!("{game_id}:{user_id}")
}

/// Holder tally for one game: rows still `Holding` versus everyone who ever
/// joined (holding + eliminated + winner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderTally {
    /// Players currently pressing the button.
    pub holding: u64,
    /// All participation rows for the game.
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_key_is_deterministic() {
        let game = Uuid::new_v4();
        assert_eq!(player_key(game, "alice"), player_key(game, "alice"));
        assert_ne!(player_key(game, "alice"), player_key(game, "bob"));
        assert_ne!(
            player_key(game, "alice"),
            player_key(Uuid::new_v4(), "alice")
        );
    }

    #[test]
    fn state_strings_round_trip_through_serde() {
        let json = serde_json::to_string(&GameState::Running).unwrap();
        assert_eq!(json, "\"RUNNING\"");
        assert_eq!(
            serde_json::from_str::<PlayerStatus>("\"ELIMINATED\"").unwrap(),
            PlayerStatus::Eliminated
        );
        assert_eq!(GameState::Finished.as_str(), "FINISHED");
    }
}
