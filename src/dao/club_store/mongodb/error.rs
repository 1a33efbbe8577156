use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to read from collection `{collection}`")]
    Read {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write document `{id}` in collection `{collection}`")]
    Write {
        collection: &'static str,
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to increment `{field}` on game `{game_id}`")]
    Increment {
        game_id: Uuid,
        field: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("game `{game_id}` does not exist")]
    MissingGame { game_id: Uuid },
    #[error("failed to open change stream on collection `{collection}`")]
    Watch {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
}
