use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameEntity, GameState, HolderTally, PlayerEntity, PlayerStatus},
    dto::{format_system_time, validation::validate_user_id},
};

/// Request body for joining a game (and for re-joining before start).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JoinRequest {
    /// Stable identity of the joining client.
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
}

/// Request body for reporting a release ("I let go").
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EliminateRequest {
    /// Stable identity of the releasing client.
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
}

/// Public snapshot of a game with live holder counts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSnapshot {
    /// Game identifier.
    pub id: Uuid,
    /// Current lifecycle state.
    pub state: GameState,
    /// RFC3339 instant the game is due to start.
    pub scheduled_at: String,
    /// Winner's player row id, present only on a contested finish.
    pub winner_id: Option<String>,
    /// Players currently holding.
    pub holding: u64,
    /// Everyone who ever joined.
    pub total: u64,
}

impl GameSnapshot {
    /// Combine a game row with its current tally.
    pub fn from_parts(game: GameEntity, tally: HolderTally) -> Self {
        Self {
            id: game.id,
            state: game.state,
            scheduled_at: format_system_time(game.scheduled_at),
            winner_id: game.winner_id,
            holding: tally.holding,
            total: tally.total,
        }
    }
}

/// Wire form of a player participation row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Player row id.
    pub id: String,
    /// Stable client identity.
    pub user_id: String,
    /// Current status within the game.
    pub status: PlayerStatus,
    /// RFC3339 first-join instant.
    pub joined_at: String,
    /// RFC3339 elimination instant, if eliminated.
    pub eliminated_at: Option<String>,
}

impl From<PlayerEntity> for PlayerSummary {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            status: value.status,
            joined_at: format_system_time(value.joined_at),
            eliminated_at: value.eliminated_at.map(format_system_time),
        }
    }
}

/// Outcome of an elimination or resolution call.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EliminationReport {
    /// More than one holder remains (or the game is not yet contested);
    /// the game goes on.
    Continuing {
        /// Players still holding.
        remaining: u64,
    },
    /// The game is finished; `winner` is absent when everyone released.
    Finished {
        /// The promoted winner, if any.
        winner: Option<PlayerSummary>,
    },
}

/// Result of a start request.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartReport {
    /// Whether this call performed the `WAITING -> RUNNING` transition.
    /// `false` means the game was already running or finished (the start
    /// guard makes repeated starts a no-op).
    pub started: bool,
    /// Snapshot of the game after the call.
    pub game: GameSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elimination_report_tags_by_outcome() {
        let continuing = serde_json::to_value(EliminationReport::Continuing { remaining: 3 })
            .expect("serialize continuing");
        assert_eq!(continuing["outcome"], "continuing");
        assert_eq!(continuing["remaining"], 3);

        let finished = serde_json::to_value(EliminationReport::Finished { winner: None })
            .expect("serialize finished");
        assert_eq!(finished["outcome"], "finished");
        assert!(finished["winner"].is_null());
    }
}
