use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// Client construction from parsed options failed.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// The initial connectivity ping never succeeded.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// How many pings were attempted before giving up.
        attempts: u32,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// A health check ping failed on an established connection.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// Index creation failed at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index key description.
        index: &'static str,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// Writing a game row failed.
    #[error("failed to save game `{id}`")]
    SaveGame {
        /// Game primary key.
        id: Uuid,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// Reading a game row failed.
    #[error("failed to load game `{id}`")]
    LoadGame {
        /// Game primary key.
        id: Uuid,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// The scheduled-window lookup failed.
    #[error("failed to query games by schedule window")]
    FindScheduled {
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// Writing a player row failed.
    #[error("failed to save player `{id}`")]
    SavePlayer {
        /// Player composite key.
        id: String,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// Reading a player row failed.
    #[error("failed to load player `{id}`")]
    LoadPlayer {
        /// Player composite key.
        id: String,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// A conditional game update could not be issued.
    #[error("failed to update game `{id}`")]
    UpdateGame {
        /// Game primary key.
        id: Uuid,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// A conditional player update could not be issued.
    #[error("failed to update player `{id}`")]
    UpdatePlayer {
        /// Player composite key.
        id: String,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// Counting player rows failed.
    #[error("failed to count players of game `{game_id}`")]
    CountPlayers {
        /// Owning game.
        game_id: Uuid,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// The finish transaction could not be driven to commit or abort.
    #[error("finish transaction failed for game `{game_id}`")]
    Transaction {
        /// Game being finished.
        game_id: Uuid,
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
    /// The operational reset failed.
    #[error("failed to wipe game and player collections")]
    Wipe {
        /// Driver-level cause.
        #[source]
        source: MongoError,
    },
}
