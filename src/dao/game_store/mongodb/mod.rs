mod connection;
mod error;
mod models;
pub mod config;
pub mod store;

pub use config::MongoConfig;
pub use connection::ConnectPolicy;
pub use error::{Access, MongoDaoError};
pub use store::MongoGameStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::InvalidUri { .. } => {
                StorageError::unavailable(format!("invalid configuration: {err}"), err)
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
