//! Elimination processing: the state transition behind "I let go".
//!
//! Each call flips at most one player row and then hands over to winner
//! resolution. Calls are idempotent and safe to issue concurrently from any
//! number of workers; the store's conditional updates are the only
//! synchronization.

use std::time::SystemTime;

use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::{
        game_store::{CasOutcome, GameStore},
        models::{GameEntity, GameState, player_key},
    },
    dto::game::EliminationReport,
    error::ServiceError,
    services::{resolution, sse_events},
    state::SharedState,
};

/// Process a release reported by `user_id` for `game_id`.
///
/// Against a `WAITING` game this is a rejected no-op; against a `FINISHED`
/// game it reports the recorded result without mutating anything. Against a
/// `RUNNING` game the player is (idempotently) eliminated, the new holder
/// tally is broadcast, and resolution decides whether the game is over.
pub async fn eliminate(
    state: &SharedState,
    game_id: Uuid,
    user_id: &str,
) -> Result<EliminationReport, ServiceError> {
    let store = state.require_game_store().await?;
    let game = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;

    match game.state {
        GameState::Waiting => Err(ServiceError::InvalidState(format!(
            "game `{game_id}` has not started"
        ))),
        GameState::Finished => finished_report(&store, game).await,
        GameState::Running => {
            let player_id = player_key(game_id, user_id);
            if store.find_player(player_id.clone()).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "player `{user_id}` never joined game `{game_id}`"
                )));
            }

            match store
                .mark_eliminated(player_id, SystemTime::now())
                .await?
            {
                CasOutcome::Applied => {
                    tracing::info!(%game_id, user_id, "player eliminated");
                }
                CasOutcome::Superseded => {
                    // Duplicate release (or a retry); already terminal.
                    debug!(%game_id, user_id, "elimination was a no-op");
                }
            }

            let tally = store.holder_tally(game_id).await?;
            sse_events::broadcast_player_update(state, game_id, tally);

            let resolution = resolution::resolve(state, game_id).await?;
            resolution::report(state, resolution).await
        }
    }
}

async fn finished_report(
    store: &std::sync::Arc<dyn GameStore>,
    game: GameEntity,
) -> Result<EliminationReport, ServiceError> {
    let winner = match game.winner_id {
        Some(winner_id) => store.find_player(winner_id).await?.map(Into::into),
        None => None,
    };
    Ok(EliminationReport::Finished { winner })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::SystemTime};

    use futures::future::join_all;

    use crate::{
        config::AppConfig,
        dao::{
            game_store::memory::MemoryGameStore,
            models::{GameEntity, PlayerStatus},
        },
        services::lifecycle,
        state::{AppState, SharedState},
    };

    async fn game_with_players(users: &[&str]) -> (SharedState, Arc<MemoryGameStore>, Uuid) {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let now = SystemTime::now();
        let game_id = Uuid::new_v4();
        store
            .insert_game(GameEntity::scheduled(game_id, now, now))
            .await
            .unwrap();
        for user in users {
            store
                .upsert_holding_player(game_id, user.to_string(), now)
                .await
                .unwrap();
        }
        (state, store, game_id)
    }

    async fn running_game_with_players(
        users: &[&str],
    ) -> (SharedState, Arc<MemoryGameStore>, Uuid) {
        let (state, store, game_id) = game_with_players(users).await;
        store
            .mark_started(game_id, SystemTime::now())
            .await
            .unwrap();
        (state, store, game_id)
    }

    #[tokio::test]
    async fn elimination_is_idempotent() {
        let (state, store, game_id) = running_game_with_players(&["a", "b", "c"]).await;

        let first = eliminate(&state, game_id, "a").await.unwrap();
        let second = eliminate(&state, game_id, "a").await.unwrap();
        for report in [first, second] {
            match report {
                EliminationReport::Continuing { remaining } => assert_eq!(remaining, 2),
                other => panic!("expected continuing, got {other:?}"),
            }
        }

        let player = store
            .find_player(player_key(game_id, "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.status, PlayerStatus::Eliminated);
    }

    #[tokio::test]
    async fn last_holder_of_contested_game_wins() {
        let (state, store, game_id) = running_game_with_players(&["a", "b", "c"]).await;

        match eliminate(&state, game_id, "a").await.unwrap() {
            EliminationReport::Continuing { remaining } => assert_eq!(remaining, 2),
            other => panic!("expected continuing, got {other:?}"),
        }
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Running);

        match eliminate(&state, game_id, "b").await.unwrap() {
            EliminationReport::Finished { winner } => {
                let winner = winner.expect("contested game must promote the last holder");
                assert_eq!(winner.user_id, "c");
                assert_eq!(winner.status, PlayerStatus::Winner);
            }
            other => panic!("expected finished, got {other:?}"),
        }

        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Finished);
        assert_eq!(game.winner_id, Some(player_key(game_id, "c")));
        let promoted = store
            .find_player(player_key(game_id, "c"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(promoted.status, PlayerStatus::Winner);
    }

    #[tokio::test]
    async fn simultaneous_final_releases_finish_with_no_winner() {
        let (state, store, game_id) = running_game_with_players(&["a", "b"]).await;

        // Both releases land before either resolution pass counts holders.
        let now = SystemTime::now();
        store
            .mark_eliminated(player_key(game_id, "a"), now)
            .await
            .unwrap();
        store
            .mark_eliminated(player_key(game_id, "b"), now)
            .await
            .unwrap();

        match eliminate(&state, game_id, "a").await.unwrap() {
            EliminationReport::Finished { winner } => assert!(winner.is_none()),
            other => panic!("expected finished, got {other:?}"),
        }

        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Finished);
        assert_eq!(game.winner_id, None);
        for user in ["a", "b"] {
            let player = store
                .find_player(player_key(game_id, user))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(player.status, PlayerStatus::Eliminated);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_releases_finish_the_game_exactly_once() {
        let (state, store, game_id) = running_game_with_players(&["a", "b"]).await;

        let calls = join_all((0..8).map(|i| {
            let state = state.clone();
            let user = if i % 2 == 0 { "a" } else { "b" };
            tokio::spawn(async move { eliminate(&state, game_id, user).await })
        }))
        .await;
        for call in calls {
            call.expect("task must not panic")
                .expect("elimination must not error");
        }

        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Finished);

        let mut winners = Vec::new();
        for user in ["a", "b"] {
            let player = store
                .find_player(player_key(game_id, user))
                .await
                .unwrap()
                .unwrap();
            if player.status == PlayerStatus::Winner {
                winners.push(player);
            }
        }

        // Either one elimination won the race to leave a single holder, or
        // both landed first and nobody was promoted. Never two winners.
        match game.winner_id {
            Some(winner_id) => {
                assert_eq!(winners.len(), 1);
                assert_eq!(winners[0].id, winner_id);
            }
            None => assert!(winners.is_empty()),
        }
    }

    #[tokio::test]
    async fn lone_participant_is_never_promoted() {
        let (state, store, game_id) = running_game_with_players(&["loner"]).await;

        // While holding, the game keeps running.
        match resolution::resolve(&state, game_id).await.unwrap() {
            resolution::Resolution::Continuing { holding } => assert_eq!(holding, 1),
            other => panic!("expected continuing, got {other:?}"),
        }

        // After releasing, the game ends with nobody promoted.
        match eliminate(&state, game_id, "loner").await.unwrap() {
            EliminationReport::Finished { winner } => assert!(winner.is_none()),
            other => panic!("expected finished, got {other:?}"),
        }
        let player = store
            .find_player(player_key(game_id, "loner"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.status, PlayerStatus::Eliminated);
    }

    #[tokio::test]
    async fn release_before_start_is_rejected_without_mutation() {
        let (state, store, game_id) = game_with_players(&["a", "b"]).await;

        let err = eliminate(&state, game_id, "a").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let player = store
            .find_player(player_key(game_id, "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.status, PlayerStatus::Holding);
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Waiting);
    }

    #[tokio::test]
    async fn unknown_game_and_player_are_not_found() {
        let (state, _store, game_id) = running_game_with_players(&["a", "b"]).await;

        let err = eliminate(&state, Uuid::new_v4(), "a").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = eliminate(&state, game_id, "stranger").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn release_after_finish_reports_the_recorded_winner() {
        let (state, store, game_id) = running_game_with_players(&["a", "b"]).await;
        eliminate(&state, game_id, "a").await.unwrap();

        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Finished);

        // Even the recorded winner re-releasing changes nothing.
        match eliminate(&state, game_id, "b").await.unwrap() {
            EliminationReport::Finished { winner } => {
                assert_eq!(winner.expect("winner recorded").user_id, "b");
            }
            other => panic!("expected finished, got {other:?}"),
        }
        let winner = store
            .find_player(player_key(game_id, "b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(winner.status, PlayerStatus::Winner);
    }

    #[tokio::test]
    async fn finished_games_stay_finished() {
        let (state, store, game_id) = running_game_with_players(&["a", "b"]).await;
        eliminate(&state, game_id, "a").await.unwrap();

        let report = lifecycle::start_game(&state, game_id).await.unwrap();
        assert!(!report.started);
        assert_eq!(report.game.state, GameState::Finished);

        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Finished);
        assert_eq!(game.winner_id, Some(player_key(game_id, "b")));
    }
}
