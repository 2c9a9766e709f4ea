mod config;
mod history;
mod models;

pub use config::ConfigStore;
pub use history::HistoryStore;
pub use models::ModelCacheStore;

use unigate_common::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        GatewayError::Config(err.to_string())
    }
}
