//! Game lifecycle: the `WAITING -> RUNNING -> FINISHED` state machine and
//! the start transition.
//!
//! The transition rules are pure; the authoritative copy of the state lives
//! in the store, which enforces each edge with a conditional update. The
//! `RUNNING -> FINISHED` edge is driven exclusively by winner resolution,
//! never directly by a client action.

use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::{
        game_store::{CasOutcome, GameStore},
        models::GameState,
    },
    dto::game::{GameSnapshot, StartReport},
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Events that can move a game between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Scheduled start time arrived or an explicit start was requested.
    Start,
    /// Winner resolution concluded the game.
    Finish,
}

/// Error returned when attempting an edge not present in the transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied to a {from:?} game")]
pub struct InvalidTransition {
    /// The state the game was in.
    pub from: GameState,
    /// The event that cannot be applied from that state.
    pub event: LifecycleEvent,
}

/// Compute the state `event` moves a game in `from` into, or reject it.
pub fn compute_transition(
    from: GameState,
    event: LifecycleEvent,
) -> Result<GameState, InvalidTransition> {
    match (from, event) {
        (GameState::Waiting, LifecycleEvent::Start) => Ok(GameState::Running),
        (GameState::Running, LifecycleEvent::Finish) => Ok(GameState::Finished),
        (from, event) => Err(InvalidTransition { from, event }),
    }
}

/// Trigger the `WAITING -> RUNNING` transition for `game_id`.
///
/// Starting a game that is already running or finished is a no-op that
/// reports the current state. When several callers race the start, the
/// store's conditional update lets exactly one through; the rest observe
/// `started == false`.
pub async fn start_game(state: &SharedState, game_id: Uuid) -> Result<StartReport, ServiceError> {
    let store = state.require_game_store().await?;
    let game = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;

    let started = match compute_transition(game.state, LifecycleEvent::Start) {
        Err(_) => false,
        Ok(_) => match store.mark_started(game_id, SystemTime::now()).await? {
            CasOutcome::Applied => {
                tracing::info!(%game_id, "game started");
                sse_events::broadcast_game_started(state, game_id);
                true
            }
            CasOutcome::Superseded => false,
        },
    };

    let game = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;
    let tally = store.holder_tally(game_id).await?;
    Ok(StartReport {
        started,
        game: GameSnapshot::from_parts(game, tally),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::GameEntity,
        },
        state::AppState,
    };

    #[test]
    fn only_two_edges_exist() {
        assert_eq!(
            compute_transition(GameState::Waiting, LifecycleEvent::Start),
            Ok(GameState::Running)
        );
        assert_eq!(
            compute_transition(GameState::Running, LifecycleEvent::Finish),
            Ok(GameState::Finished)
        );
    }

    #[test]
    fn finished_is_terminal() {
        for event in [LifecycleEvent::Start, LifecycleEvent::Finish] {
            let err = compute_transition(GameState::Finished, event).unwrap_err();
            assert_eq!(err.from, GameState::Finished);
        }
    }

    #[test]
    fn running_cannot_restart_and_waiting_cannot_finish() {
        assert!(compute_transition(GameState::Running, LifecycleEvent::Start).is_err());
        assert!(compute_transition(GameState::Waiting, LifecycleEvent::Finish).is_err());
    }

    #[tokio::test]
    async fn start_applies_once_then_reports_noop() {
        let store = Arc::new(MemoryGameStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;

        let game_id = Uuid::new_v4();
        let now = SystemTime::now();
        store
            .insert_game(GameEntity::scheduled(game_id, now, now))
            .await
            .unwrap();

        let first = start_game(&state, game_id).await.unwrap();
        assert!(first.started);
        assert_eq!(first.game.state, GameState::Running);

        let second = start_game(&state, game_id).await.unwrap();
        assert!(!second.started);
        assert_eq!(second.game.state, GameState::Running);
    }

    #[tokio::test]
    async fn start_missing_game_is_not_found() {
        let state =
            AppState::with_store(AppConfig::default(), Arc::new(MemoryGameStore::new())).await;
        let err = start_game(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
