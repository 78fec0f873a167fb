//! Winner resolution: decides, from the current holder count, whether a
//! game finishes and who (if anyone) wins.
//!
//! Resolution may run concurrently with itself and with eliminations, so
//! every decision is re-validated by a store-level conditional update: only
//! the first resolver to win the `RUNNING -> FINISHED` race performs the
//! promotion, and losers simply read back the finished result.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::{CasOutcome, GameStore},
        models::{GameState, PlayerEntity, PlayerStatus},
    },
    dto::game::{EliminationReport, PlayerSummary},
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// A game only counts as contested once this many players ever joined;
/// below it a sole holder is never promoted.
const MIN_CONTESTED_TOTAL: u64 = 2;

/// Every retry implies the game finished or the holder count strictly
/// decreased, so this bound is never reached against a well-behaved store.
const RESOLVE_RETRY_LIMIT: usize = 8;

/// Outcome of one resolution pass.
#[derive(Debug)]
pub enum Resolution {
    /// The game goes on (more than one holder, or not yet contested).
    Continuing {
        /// Players still holding.
        holding: u64,
    },
    /// This call finished the game and promoted the sole holder.
    FinishedWithWinner {
        /// The promoted winner row.
        winner: PlayerEntity,
    },
    /// This call finished the game with every participant eliminated.
    FinishedNoWinner,
    /// A concurrent resolver finished the game first; nothing was mutated.
    AlreadyFinished {
        /// Winner recorded by whoever won the race, if any.
        winner_id: Option<String>,
    },
}

/// Resolve `game_id` against its current holder count.
///
/// Returns [`ServiceError::InvalidState`] for a game that has not started
/// and [`ServiceError::NotFound`] for a missing game. Broadcasts the
/// `game.over` notification exactly once, from whichever call performed the
/// finishing transition.
pub async fn resolve(state: &SharedState, game_id: Uuid) -> Result<Resolution, ServiceError> {
    let store = state.require_game_store().await?;

    for _ in 0..RESOLVE_RETRY_LIMIT {
        let game = store
            .find_game(game_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;
        match game.state {
            GameState::Waiting => {
                return Err(ServiceError::InvalidState(format!(
                    "game `{game_id}` has not started"
                )));
            }
            GameState::Finished => {
                return Ok(Resolution::AlreadyFinished {
                    winner_id: game.winner_id,
                });
            }
            GameState::Running => {}
        }

        let tally = store.holder_tally(game_id).await?;
        match tally.holding {
            holding if holding > 1 => return Ok(Resolution::Continuing { holding }),
            1 => {
                if tally.total < MIN_CONTESTED_TOTAL {
                    // A lone joiner never wins a game nobody contested.
                    return Ok(Resolution::Continuing { holding: 1 });
                }
                let Some(mut winner) = store.sole_holder(game_id).await? else {
                    // The tally went stale before we could read the holder.
                    continue;
                };
                match store
                    .finish_with_winner(game_id, winner.id.clone(), SystemTime::now())
                    .await?
                {
                    CasOutcome::Applied => {
                        winner.status = PlayerStatus::Winner;
                        info!(%game_id, winner = %winner.user_id, "game finished with winner");
                        sse_events::broadcast_game_over(state, game_id, Some(&winner));
                        return Ok(Resolution::FinishedWithWinner { winner });
                    }
                    CasOutcome::Superseded => {
                        debug!(%game_id, "finish-with-winner superseded; re-reading");
                        continue;
                    }
                }
            }
            _ => {
                if tally.total == 0 {
                    // Nothing to resolve in a game nobody ever joined.
                    return Ok(Resolution::Continuing { holding: 0 });
                }
                match store
                    .finish_without_winner(game_id, SystemTime::now())
                    .await?
                {
                    CasOutcome::Applied => {
                        info!(%game_id, "game finished with no winner");
                        sse_events::broadcast_game_over(state, game_id, None);
                        return Ok(Resolution::FinishedNoWinner);
                    }
                    CasOutcome::Superseded => {
                        debug!(%game_id, "finish-without-winner superseded; re-reading");
                        continue;
                    }
                }
            }
        }
    }

    Err(ServiceError::InvalidState(format!(
        "resolution of game `{game_id}` did not converge"
    )))
}

/// Render a [`Resolution`] as the wire-level [`EliminationReport`], loading
/// the winner row when another resolver recorded it.
pub async fn report(
    state: &SharedState,
    resolution: Resolution,
) -> Result<EliminationReport, ServiceError> {
    match resolution {
        Resolution::Continuing { holding } => Ok(EliminationReport::Continuing {
            remaining: holding,
        }),
        Resolution::FinishedWithWinner { winner } => Ok(EliminationReport::Finished {
            winner: Some(winner.into()),
        }),
        Resolution::FinishedNoWinner => Ok(EliminationReport::Finished { winner: None }),
        Resolution::AlreadyFinished { winner_id } => {
            let winner = match winner_id {
                Some(id) => load_winner(state, id).await?,
                None => None,
            };
            Ok(EliminationReport::Finished { winner })
        }
    }
}

async fn load_winner(
    state: &SharedState,
    winner_id: String,
) -> Result<Option<PlayerSummary>, ServiceError> {
    let store = state.require_game_store().await?;
    Ok(store.find_player(winner_id).await?.map(Into::into))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::SystemTime};

    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::{GameEntity, player_key},
        },
        state::AppState,
    };

    async fn running_game(
        store: &Arc<MemoryGameStore>,
        users: &[&str],
    ) -> Uuid {
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
        store.mark_started(game_id, now).await.unwrap();
        game_id
    }

    #[tokio::test]
    async fn more_than_one_holder_continues() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game_id = running_game(&store, &["a", "b", "c"]).await;

        match resolve(&state, game_id).await.unwrap() {
            Resolution::Continuing { holding } => assert_eq!(holding, 3),
            other => panic!("expected continuing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sole_holder_of_uncontested_game_is_not_promoted() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game_id = running_game(&store, &["loner"]).await;

        match resolve(&state, game_id).await.unwrap() {
            Resolution::Continuing { holding } => assert_eq!(holding, 1),
            other => panic!("expected continuing, got {other:?}"),
        }
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Running);
    }

    #[tokio::test]
    async fn empty_running_game_is_left_alone() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game_id = running_game(&store, &[]).await;

        match resolve(&state, game_id).await.unwrap() {
            Resolution::Continuing { holding } => assert_eq!(holding, 0),
            other => panic!("expected continuing, got {other:?}"),
        }
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Running);
    }

    #[tokio::test]
    async fn redundant_resolution_reports_the_first_result() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let game_id = running_game(&store, &["a", "b"]).await;
        store
            .mark_eliminated(player_key(game_id, "a"), SystemTime::now())
            .await
            .unwrap();

        let first = resolve(&state, game_id).await.unwrap();
        let winner_id = match first {
            Resolution::FinishedWithWinner { ref winner } => winner.id.clone(),
            ref other => panic!("expected winner, got {other:?}"),
        };

        match resolve(&state, game_id).await.unwrap() {
            Resolution::AlreadyFinished { winner_id: second } => {
                assert_eq!(second, Some(winner_id));
            }
            other => panic!("expected already-finished, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolving_a_waiting_game_is_invalid() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let now = SystemTime::now();
        let game_id = Uuid::new_v4();
        store
            .insert_game(GameEntity::scheduled(game_id, now, now))
            .await
            .unwrap();

        let err = resolve(&state, game_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
