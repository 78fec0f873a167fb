//! In-memory [`GameStore`] backend.
//!
//! A single mutex over both tables makes every conditional update — and the
//! combined finish+promote write — atomic, which is exactly the contract the
//! trait demands. Used by the test suite and by deployments without a
//! database (state does not survive a restart).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::SystemTime,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    game_store::{CasOutcome, GameStore, JoinOutcome},
    models::{GameEntity, GameState, HolderTally, PlayerEntity, PlayerStatus, player_key},
    storage::StorageResult,
};

/// In-memory game store. Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    games: HashMap<Uuid, GameEntity>,
    players: HashMap<String, PlayerEntity>,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        // A poisoned lock only means another test thread panicked mid-write;
        // the tables themselves are still usable.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn tally_locked(tables: &Tables, game_id: Uuid) -> HolderTally {
        let mut tally = HolderTally {
            holding: 0,
            total: 0,
        };
        for player in tables.players.values() {
            if player.game_id != game_id {
                continue;
            }
            tally.total += 1;
            if player.status == PlayerStatus::Holding {
                tally.holding += 1;
            }
        }
        tally
    }
}

impl GameStore for MemoryGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_tables(|tables| {
                tables.games.insert(game.id, game);
            });
            Ok(())
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.with_tables(|tables| tables.games.get(&id).cloned())) })
    }

    fn find_game_scheduled_between(
        &self,
        from: SystemTime,
        to: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.with_tables(|tables| {
                tables
                    .games
                    .values()
                    .find(|game| game.scheduled_at >= from && game.scheduled_at < to)
                    .cloned()
            }))
        })
    }

    fn upsert_holding_player(
        &self,
        game_id: Uuid,
        user_id: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.with_tables(|tables| {
                let Some(game) = tables.games.get(&game_id) else {
                    return JoinOutcome::NoGame;
                };
                if game.state != GameState::Waiting {
                    return JoinOutcome::Closed(game.state);
                }

                let id = player_key(game_id, &user_id);
                let row = tables
                    .players
                    .entry(id)
                    .and_modify(|player| {
                        player.status = PlayerStatus::Holding;
                        player.eliminated_at = None;
                    })
                    .or_insert_with(|| PlayerEntity::holding(game_id, user_id, now));
                JoinOutcome::Joined(row.clone())
            }))
        })
    }

    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.with_tables(|tables| tables.players.get(&id).cloned())) })
    }

    fn mark_started(
        &self,
        game_id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.with_tables(|tables| match tables.games.get_mut(&game_id) {
                Some(game) if game.state == GameState::Waiting => {
                    game.state = GameState::Running;
                    game.updated_at = now;
                    CasOutcome::Applied
                }
                _ => CasOutcome::Superseded,
            }))
        })
    }

    fn mark_eliminated(
        &self,
        player_id: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(
                store.with_tables(|tables| match tables.players.get_mut(&player_id) {
                    Some(player) if player.status == PlayerStatus::Holding => {
                        player.status = PlayerStatus::Eliminated;
                        player.eliminated_at = Some(now);
                        CasOutcome::Applied
                    }
                    _ => CasOutcome::Superseded,
                }),
            )
        })
    }

    fn holder_tally(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<HolderTally>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.with_tables(|tables| Self::tally_locked(tables, game_id))) })
    }

    fn sole_holder(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.with_tables(|tables| {
                let mut holders = tables
                    .players
                    .values()
                    .filter(|p| p.game_id == game_id && p.status == PlayerStatus::Holding);
                match (holders.next(), holders.next()) {
                    (Some(holder), None) => Some(holder.clone()),
                    _ => None,
                }
            }))
        })
    }

    fn finish_with_winner(
        &self,
        game_id: Uuid,
        winner_id: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.with_tables(|tables| {
                let game_running = tables
                    .games
                    .get(&game_id)
                    .is_some_and(|game| game.state == GameState::Running);
                let player_holding = tables.players.get(&winner_id).is_some_and(|player| {
                    player.game_id == game_id && player.status == PlayerStatus::Holding
                });
                if !game_running || !player_holding {
                    return CasOutcome::Superseded;
                }

                // Both preconditions verified under the same lock: the two
                // writes below are observable only together.
                if let Some(game) = tables.games.get_mut(&game_id) {
                    game.state = GameState::Finished;
                    game.winner_id = Some(winner_id.clone());
                    game.updated_at = now;
                }
                if let Some(player) = tables.players.get_mut(&winner_id) {
                    player.status = PlayerStatus::Winner;
                }
                CasOutcome::Applied
            }))
        })
    }

    fn finish_without_winner(
        &self,
        game_id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.with_tables(|tables| match tables.games.get_mut(&game_id) {
                Some(game) if game.state == GameState::Running => {
                    game.state = GameState::Finished;
                    game.winner_id = None;
                    game.updated_at = now;
                    CasOutcome::Applied
                }
                _ => CasOutcome::Superseded,
            }))
        })
    }

    fn wipe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_tables(|tables| {
                tables.games.clear();
                tables.players.clear();
            });
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_750_000_000)
    }

    async fn seeded_running_game(store: &MemoryGameStore, users: &[&str]) -> Uuid {
        let game_id = Uuid::new_v4();
        store
            .insert_game(GameEntity::scheduled(game_id, now(), now()))
            .await
            .unwrap();
        for user in users {
            store
                .upsert_holding_player(game_id, user.to_string(), now())
                .await
                .unwrap();
        }
        assert_eq!(
            store.mark_started(game_id, now()).await.unwrap(),
            CasOutcome::Applied
        );
        game_id
    }

    #[tokio::test]
    async fn mark_eliminated_applies_once() {
        let store = MemoryGameStore::new();
        let game_id = seeded_running_game(&store, &["a", "b"]).await;
        let id = player_key(game_id, "a");

        assert_eq!(
            store.mark_eliminated(id.clone(), now()).await.unwrap(),
            CasOutcome::Applied
        );
        assert_eq!(
            store.mark_eliminated(id.clone(), now()).await.unwrap(),
            CasOutcome::Superseded
        );

        let player = store.find_player(id).await.unwrap().unwrap();
        assert_eq!(player.status, PlayerStatus::Eliminated);
        assert!(player.eliminated_at.is_some());
    }

    #[tokio::test]
    async fn finish_with_winner_rejects_eliminated_candidate() {
        let store = MemoryGameStore::new();
        let game_id = seeded_running_game(&store, &["a", "b"]).await;
        let loser = player_key(game_id, "a");
        store.mark_eliminated(loser.clone(), now()).await.unwrap();

        // Promoting a row that is no longer holding must not partially apply.
        assert_eq!(
            store
                .finish_with_winner(game_id, loser, now())
                .await
                .unwrap(),
            CasOutcome::Superseded
        );
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Running);
        assert_eq!(game.winner_id, None);
    }

    #[tokio::test]
    async fn finish_races_admit_one_applier() {
        let store = MemoryGameStore::new();
        let game_id = seeded_running_game(&store, &["a", "b"]).await;
        store
            .mark_eliminated(player_key(game_id, "a"), now())
            .await
            .unwrap();
        let winner = player_key(game_id, "b");

        let first = store
            .finish_with_winner(game_id, winner.clone(), now())
            .await
            .unwrap();
        let second = store
            .finish_with_winner(game_id, winner.clone(), now())
            .await
            .unwrap();
        assert_eq!(first, CasOutcome::Applied);
        assert_eq!(second, CasOutcome::Superseded);

        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.state, GameState::Finished);
        assert_eq!(game.winner_id, Some(winner.clone()));
        let player = store.find_player(winner).await.unwrap().unwrap();
        assert_eq!(player.status, PlayerStatus::Winner);
    }

    #[tokio::test]
    async fn join_window_closes_on_start() {
        let store = MemoryGameStore::new();
        let game_id = seeded_running_game(&store, &["a"]).await;

        match store
            .upsert_holding_player(game_id, "late".into(), now())
            .await
            .unwrap()
        {
            JoinOutcome::Closed(state) => assert_eq!(state, GameState::Running),
            other => panic!("expected closed join window, got {other:?}"),
        }
        assert_eq!(store.holder_tally(game_id).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn rejoin_resets_elimination_before_start() {
        let store = MemoryGameStore::new();
        let game_id = Uuid::new_v4();
        store
            .insert_game(GameEntity::scheduled(game_id, now(), now()))
            .await
            .unwrap();
        store
            .upsert_holding_player(game_id, "a".into(), now())
            .await
            .unwrap();

        let rejoined = store
            .upsert_holding_player(game_id, "a".into(), now())
            .await
            .unwrap();
        match rejoined {
            JoinOutcome::Joined(player) => {
                assert_eq!(player.status, PlayerStatus::Holding);
                assert_eq!(player.eliminated_at, None);
            }
            other => panic!("expected joined row, got {other:?}"),
        }
        assert_eq!(store.holder_tally(game_id).await.unwrap().total, 1);
    }
}
