use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{GameEntity, GameState, PlayerEntity, PlayerStatus};

/// Storage shape of a game row. `state` serializes as the same
/// SCREAMING_SNAKE string the conditional update filters match on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    scheduled_at: DateTime,
    state: GameState,
    winner_id: Option<String>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            scheduled_at: DateTime::from_system_time(value.scheduled_at),
            state: value.state,
            winner_id: value.winner_id,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            scheduled_at: value.scheduled_at.to_system_time(),
            state: value.state,
            winner_id: value.winner_id,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Storage shape of a player participation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    game_id: Uuid,
    user_id: String,
    status: PlayerStatus,
    joined_at: DateTime,
    eliminated_at: Option<DateTime>,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            user_id: value.user_id,
            status: value.status,
            joined_at: DateTime::from_system_time(value.joined_at),
            eliminated_at: value.eliminated_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            user_id: value.user_id,
            status: value.status,
            joined_at: value.joined_at.to_system_time(),
            eliminated_at: value.eliminated_at.map(|at| at.to_system_time()),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
