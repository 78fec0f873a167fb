use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, DateTime, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, MongoPlayerDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    game_store::{CasOutcome, GameStore, JoinOutcome},
    models::{GameEntity, GameState, HolderTally, PlayerEntity, PlayerStatus, player_key},
    storage::StorageResult,
};

const GAME_COLLECTION_NAME: &str = "games";
const PLAYER_COLLECTION_NAME: &str = "players";

/// MongoDB-backed [`GameStore`].
///
/// Single-row compare-and-set updates are expressed as `update_one` calls
/// whose filter includes the expected current state; the combined
/// finish+promote write runs inside a multi-document transaction so it is
/// never observable half-applied.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Holder tallies and sole-holder lookups filter on (game_id, status).
        let players = database.collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME);
        let player_index = mongodb::IndexModel::builder()
            .keys(doc! {"game_id": 1, "status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_game_status_idx".to_owned()))
                    .build(),
            )
            .build();
        players
            .create_index(player_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION_NAME,
                index: "game_id,status",
                source,
            })?;

        // The daily-game lookup scans a schedule window.
        let games = database.collection::<MongoGameDocument>(GAME_COLLECTION_NAME);
        let game_index = mongodb::IndexModel::builder()
            .keys(doc! {"scheduled_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_scheduled_at_idx".to_owned()))
                    .build(),
            )
            .build();
        games
            .create_index(game_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "scheduled_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn game_collection(&self) -> Collection<MongoGameDocument> {
        self.database()
            .await
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn player_collection(&self) -> Collection<MongoPlayerDocument> {
        self.database()
            .await
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn insert_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        self.game_collection()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame { id, source })?;
        Ok(())
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let document = self
            .game_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_game_scheduled_between(
        &self,
        from: SystemTime,
        to: SystemTime,
    ) -> MongoResult<Option<GameEntity>> {
        let filter = doc! {
            "scheduled_at": {
                "$gte": DateTime::from_system_time(from),
                "$lt": DateTime::from_system_time(to),
            }
        };
        let document = self
            .game_collection()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::FindScheduled { source })?;
        Ok(document.map(Into::into))
    }

    async fn upsert_holding_player(
        &self,
        game_id: Uuid,
        user_id: String,
        now: SystemTime,
    ) -> MongoResult<JoinOutcome> {
        let Some(game) = self.find_game(game_id).await? else {
            return Ok(JoinOutcome::NoGame);
        };
        if game.state != GameState::Waiting {
            return Ok(JoinOutcome::Closed(game.state));
        }

        let id = player_key(game_id, &user_id);
        let players = self.player_collection().await;
        players
            .update_one(
                doc! {"_id": &id},
                doc! {
                    "$set": {
                        "status": PlayerStatus::Holding.as_str(),
                        "eliminated_at": Bson::Null,
                    },
                    "$setOnInsert": {
                        "game_id": uuid_as_binary(game_id),
                        "user_id": &user_id,
                        "joined_at": DateTime::from_system_time(now),
                    },
                },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                id: id.clone(),
                source,
            })?;

        // The join window may have closed between the state check and the
        // upsert. A row that slipped past the boundary is flipped out again
        // so a running game never gains a holder.
        if let Some(current) = self.find_game(game_id).await?
            && current.state != GameState::Waiting
        {
            players
                .update_one(
                    doc! {"_id": &id, "status": PlayerStatus::Holding.as_str()},
                    doc! {"$set": {
                        "status": PlayerStatus::Eliminated.as_str(),
                        "eliminated_at": DateTime::from_system_time(now),
                    }},
                )
                .await
                .map_err(|source| MongoDaoError::UpdatePlayer {
                    id: id.clone(),
                    source,
                })?;
            return Ok(JoinOutcome::Closed(current.state));
        }

        let row = self
            .find_player(id)
            .await?
            .unwrap_or_else(|| PlayerEntity::holding(game_id, user_id, now));
        Ok(JoinOutcome::Joined(row))
    }

    async fn find_player(&self, id: String) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .player_collection()
            .await
            .find_one(doc! {"_id": &id})
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn mark_started(&self, game_id: Uuid, now: SystemTime) -> MongoResult<CasOutcome> {
        let result = self
            .game_collection()
            .await
            .update_one(
                doc! {"_id": uuid_as_binary(game_id), "state": GameState::Waiting.as_str()},
                doc! {"$set": {
                    "state": GameState::Running.as_str(),
                    "updated_at": DateTime::from_system_time(now),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateGame {
                id: game_id,
                source,
            })?;
        Ok(cas_outcome(result.modified_count))
    }

    async fn mark_eliminated(&self, player_id: String, now: SystemTime) -> MongoResult<CasOutcome> {
        let result = self
            .player_collection()
            .await
            .update_one(
                doc! {"_id": &player_id, "status": PlayerStatus::Holding.as_str()},
                doc! {"$set": {
                    "status": PlayerStatus::Eliminated.as_str(),
                    "eliminated_at": DateTime::from_system_time(now),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdatePlayer {
                id: player_id,
                source,
            })?;
        Ok(cas_outcome(result.modified_count))
    }

    async fn holder_tally(&self, game_id: Uuid) -> MongoResult<HolderTally> {
        let players = self.player_collection().await;
        let holding = players
            .count_documents(doc! {
                "game_id": uuid_as_binary(game_id),
                "status": PlayerStatus::Holding.as_str(),
            })
            .await
            .map_err(|source| MongoDaoError::CountPlayers { game_id, source })?;
        let total = players
            .count_documents(doc! {"game_id": uuid_as_binary(game_id)})
            .await
            .map_err(|source| MongoDaoError::CountPlayers { game_id, source })?;
        Ok(HolderTally { holding, total })
    }

    async fn sole_holder(&self, game_id: Uuid) -> MongoResult<Option<PlayerEntity>> {
        let mut holders: Vec<MongoPlayerDocument> = self
            .player_collection()
            .await
            .find(doc! {
                "game_id": uuid_as_binary(game_id),
                "status": PlayerStatus::Holding.as_str(),
            })
            .limit(2)
            .await
            .map_err(|source| MongoDaoError::CountPlayers { game_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::CountPlayers { game_id, source })?;

        if holders.len() == 1 {
            Ok(holders.pop().map(Into::into))
        } else {
            Ok(None)
        }
    }

    async fn finish_with_winner(
        &self,
        game_id: Uuid,
        winner_id: String,
        now: SystemTime,
    ) -> MongoResult<CasOutcome> {
        let client = self.client().await;
        let games = self.game_collection().await;
        let players = self.player_collection().await;

        let txn = |source| MongoDaoError::Transaction { game_id, source };

        let mut session = client.start_session().await.map_err(txn)?;
        session.start_transaction().await.map_err(txn)?;

        let game_update = games
            .update_one(
                doc! {"_id": uuid_as_binary(game_id), "state": GameState::Running.as_str()},
                doc! {"$set": {
                    "state": GameState::Finished.as_str(),
                    "winner_id": &winner_id,
                    "updated_at": DateTime::from_system_time(now),
                }},
            )
            .session(&mut session)
            .await;
        let player_update = players
            .update_one(
                doc! {"_id": &winner_id, "status": PlayerStatus::Holding.as_str()},
                doc! {"$set": {"status": PlayerStatus::Winner.as_str()}},
            )
            .session(&mut session)
            .await;

        match (game_update, player_update) {
            (Ok(game), Ok(player)) if game.modified_count == 1 && player.modified_count == 1 => {
                session.commit_transaction().await.map_err(txn)?;
                Ok(CasOutcome::Applied)
            }
            (Ok(_), Ok(_)) => {
                session.abort_transaction().await.map_err(txn)?;
                Ok(CasOutcome::Superseded)
            }
            (Err(source), _) | (_, Err(source)) => {
                let _ = session.abort_transaction().await;
                Err(txn(source))
            }
        }
    }

    async fn finish_without_winner(&self, game_id: Uuid, now: SystemTime) -> MongoResult<CasOutcome> {
        let result = self
            .game_collection()
            .await
            .update_one(
                doc! {"_id": uuid_as_binary(game_id), "state": GameState::Running.as_str()},
                doc! {"$set": {
                    "state": GameState::Finished.as_str(),
                    "winner_id": Bson::Null,
                    "updated_at": DateTime::from_system_time(now),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateGame {
                id: game_id,
                source,
            })?;
        Ok(cas_outcome(result.modified_count))
    }

    async fn wipe(&self) -> MongoResult<()> {
        self.player_collection()
            .await
            .delete_many(doc! {})
            .await
            .map_err(|source| MongoDaoError::Wipe { source })?;
        self.game_collection()
            .await
            .delete_many(doc! {})
            .await
            .map_err(|source| MongoDaoError::Wipe { source })?;
        Ok(())
    }
}

fn cas_outcome(modified_count: u64) -> CasOutcome {
    if modified_count == 1 {
        CasOutcome::Applied
    } else {
        CasOutcome::Superseded
    }
}

impl GameStore for MongoGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn find_game_scheduled_between(
        &self,
        from: SystemTime,
        to: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_game_scheduled_between(from, to)
                .await
                .map_err(Into::into)
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
            store
                .upsert_holding_player(game_id, user_id, now)
                .await
                .map_err(Into::into)
        })
    }

    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(id).await.map_err(Into::into) })
    }

    fn mark_started(
        &self,
        game_id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.mark_started(game_id, now).await.map_err(Into::into) })
    }

    fn mark_eliminated(
        &self,
        player_id: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mark_eliminated(player_id, now)
                .await
                .map_err(Into::into)
        })
    }

    fn holder_tally(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<HolderTally>> {
        let store = self.clone();
        Box::pin(async move { store.holder_tally(game_id).await.map_err(Into::into) })
    }

    fn sole_holder(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.sole_holder(game_id).await.map_err(Into::into) })
    }

    fn finish_with_winner(
        &self,
        game_id: Uuid,
        winner_id: String,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .finish_with_winner(game_id, winner_id, now)
                .await
                .map_err(Into::into)
        })
    }

    fn finish_without_winner(
        &self,
        game_id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .finish_without_winner(game_id, now)
                .await
                .map_err(Into::into)
        })
    }

    fn wipe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.wipe().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
