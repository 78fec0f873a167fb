//! Game bootstrap and participation: daily game lookup/creation, joins,
//! snapshots, and the operational reset.

use std::{sync::Arc, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        game_store::{GameStore, JoinOutcome},
        models::GameEntity,
    },
    dto::game::GameSnapshot,
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Today's game, creating the next scheduled one when none exists.
///
/// This is the first-visitor bootstrap: whoever asks first causes the daily
/// game row to exist. A cron calling [`create_game`] achieves the same.
pub async fn current_game(state: &SharedState) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    let now = SystemTime::now();

    // Prefer a game anchored in today's window, whatever its state, so a
    // running or freshly finished game is not hidden once the next start
    // rolls over to tomorrow.
    let (from, to) = state.config().schedule().day_window(now);
    if let Some(game) = store.find_game_scheduled_between(from, to).await? {
        return snapshot(&store, game).await;
    }

    let game = ensure_scheduled_game(state, &store, now).await?;
    snapshot(&store, game).await
}

/// Create (idempotently) the game for the next configured daily start.
pub async fn create_game(state: &SharedState) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    let game = ensure_scheduled_game(state, &store, SystemTime::now()).await?;
    snapshot(&store, game).await
}

/// Snapshot one game with its live holder tally.
pub async fn game_snapshot(state: &SharedState, id: Uuid) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    let game = store
        .find_game(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{id}` not found")))?;
    snapshot(&store, game).await
}

/// Upsert `user_id`'s participation row back to `Holding`.
///
/// Legal any time before the game starts, and re-callable to reset a
/// rejoining player's row. Once the game is running the join window is
/// closed for everyone, including previously eliminated players.
pub async fn join(
    state: &SharedState,
    game_id: Uuid,
    user_id: String,
) -> Result<GameSnapshot, ServiceError> {
    let store = state.require_game_store().await?;
    match store
        .upsert_holding_player(game_id, user_id, SystemTime::now())
        .await?
    {
        JoinOutcome::NoGame => Err(ServiceError::NotFound(format!(
            "game `{game_id}` not found"
        ))),
        JoinOutcome::Closed(game_state) => Err(ServiceError::InvalidState(format!(
            "game `{game_id}` is {} and no longer accepts joins",
            game_state.as_str()
        ))),
        JoinOutcome::Joined(player) => {
            info!(%game_id, user_id = %player.user_id, "player joined");
            let tally = store.holder_tally(game_id).await?;
            sse_events::broadcast_player_update(state, game_id, tally);
            let game = store
                .find_game(game_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;
            Ok(GameSnapshot::from_parts(game, tally))
        }
    }
}

/// Delete every game and player row. Test/operational reset only.
pub async fn reset_all(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_game_store().await?;
    store.wipe().await?;
    info!("wiped all game and player rows");
    Ok(())
}

async fn ensure_scheduled_game(
    state: &SharedState,
    store: &Arc<dyn GameStore>,
    now: SystemTime,
) -> Result<GameEntity, ServiceError> {
    let schedule = state.config().schedule();
    let next = schedule.next_start(now);
    let (from, to) = schedule.day_window(next);
    if let Some(game) = store.find_game_scheduled_between(from, to).await? {
        return Ok(game);
    }

    let game = GameEntity::scheduled(Uuid::new_v4(), next, now);
    store.insert_game(game.clone()).await?;
    info!(game_id = %game.id, "created scheduled game");
    sse_events::broadcast_game_created(state, &game);
    Ok(game)
}

async fn snapshot(
    store: &Arc<dyn GameStore>,
    game: GameEntity,
) -> Result<GameSnapshot, ServiceError> {
    let tally = store.holder_tally(game.id).await?;
    Ok(GameSnapshot::from_parts(game, tally))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        config::AppConfig,
        dao::{
            game_store::memory::MemoryGameStore,
            models::{GameState, PlayerStatus, player_key},
        },
        state::AppState,
    };

    #[tokio::test]
    async fn current_game_bootstraps_once() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;

        let first = current_game(&state).await.unwrap();
        assert_eq!(first.state, GameState::Waiting);
        assert_eq!(first.total, 0);

        let second = current_game(&state).await.unwrap();
        assert_eq!(second.id, first.id);

        let third = create_game(&state).await.unwrap();
        assert_eq!(third.id, first.id);
    }

    #[tokio::test]
    async fn join_counts_holders_and_is_upsert_safe() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game = current_game(&state).await.unwrap();

        let after_a = join(&state, game.id, "a".into()).await.unwrap();
        assert_eq!(after_a.holding, 1);
        let after_b = join(&state, game.id, "b".into()).await.unwrap();
        assert_eq!(after_b.holding, 2);

        // Re-join is a reset, not a second row.
        let again = join(&state, game.id, "a".into()).await.unwrap();
        assert_eq!(again.holding, 2);
        assert_eq!(again.total, 2);
    }

    #[tokio::test]
    async fn join_window_closes_once_running() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game = current_game(&state).await.unwrap();
        join(&state, game.id, "a".into()).await.unwrap();
        store
            .mark_started(game.id, SystemTime::now())
            .await
            .unwrap();

        let err = join(&state, game.id, "late".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        // An eliminated player cannot sneak back in either.
        store
            .mark_eliminated(player_key(game.id, "a"), SystemTime::now())
            .await
            .unwrap();
        let err = join(&state, game.id, "a".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        let row = store
            .find_player(player_key(game.id, "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, PlayerStatus::Eliminated);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game = current_game(&state).await.unwrap();
        join(&state, game.id, "a".into()).await.unwrap();

        reset_all(&state).await.unwrap();
        assert!(store.find_game(game.id).await.unwrap().is_none());
        assert!(
            store
                .find_player(player_key(game.id, "a"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn missing_game_cannot_be_joined() {
        let state =
            AppState::with_store(AppConfig::default(), Arc::new(MemoryGameStore::new())).await;
        let err = join(&state, Uuid::new_v4(), "a".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
