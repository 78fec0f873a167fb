/// In-memory backend used by tests and database-less deployments.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{GameEntity, GameState, HolderTally, PlayerEntity};
use crate::dao::storage::StorageResult;

/// Result of a conditional (compare-and-set) update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// This call performed the transition.
    Applied,
    /// The precondition no longer held: the row is missing or another
    /// caller got there first. The caller re-reads to decide what happened.
    Superseded,
}

/// Result of a join upsert.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// The participation row now exists in `Holding` status.
    Joined(PlayerEntity),
    /// The join window is closed: the game already started or finished.
    Closed(GameState),
    /// The referenced game does not exist.
    NoGame,
}

/// Abstraction over the persistence layer for games and player rows.
///
/// Every mutating method that races with concurrent callers is expressed as
/// a conditional update: the write applies only while the stored row still
/// satisfies the stated precondition, and the backend reports
/// [`CasOutcome::Superseded`] otherwise. `finish_with_winner` is the one
/// multi-row transition and must be all-or-nothing: a game marked finished
/// with its winner not promoted (or vice versa) must never be observable.
pub trait GameStore: Send + Sync {
    /// Persist a freshly created game row.
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a game by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Find the game scheduled inside `[from, to)`, if any.
    fn find_game_scheduled_between(
        &self,
        from: SystemTime,
        to: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Upsert the `(game, user)` participation row back to `Holding`.
    /// Only legal while the game is `Waiting`; the backend enforces the
    /// window and compensates a row that slipped in as the game started.
    fn upsert_holding_player(
        &self,
        game_id: Uuid,
        user_id: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>>;
    /// Load a player row by its composite key.
    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Conditional `Waiting -> Running` transition of the game row.
    fn mark_started(
        &self,
        game_id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Conditional `Holding -> Eliminated` transition of one player row.
    fn mark_eliminated(
        &self,
        player_id: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Count holding and total participation rows for a game.
    fn holder_tally(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<HolderTally>>;
    /// The single remaining `Holding` row, or `None` when the holder count
    /// is not exactly one.
    fn sole_holder(&self, game_id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// All-or-nothing finish: `Running -> Finished` on the game row plus
    /// `Holding -> Winner` on the winner row, applied together or not at all.
    fn finish_with_winner(
        &self,
        game_id: Uuid,
        winner_id: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Conditional `Running -> Finished` with no winner recorded.
    fn finish_without_winner(
        &self,
        game_id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Delete every game and player row. Operational reset only.
    fn wipe(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
