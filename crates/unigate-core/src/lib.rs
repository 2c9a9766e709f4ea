pub mod catalog;
pub mod forward;
pub mod registry;
pub mod token;
pub mod unified;
pub mod upstream;

use std::path::Path;

use unigate_common::GatewayError;
use unigate_storage::{ConfigStore, HistoryStore, ModelCacheStore};

use crate::token::{TokenCache, TokenResolver};

pub use forward::ChatReply;
pub use registry::{EndpointListing, EndpointSummary};

/// The gateway engine: durable stores, the in-memory token cache, and one
/// shared upstream HTTP client. Configuration is re-read from disk at the
/// start of each operation, so this struct holds no authoritative config
/// state of its own.
pub struct Gateway {
    config: ConfigStore,
    models: ModelCacheStore,
    history: HistoryStore,
    tokens: TokenResolver,
    http: wreq::Client,
}

impl Gateway {
    pub fn new(data_dir: &Path) -> Result<Self, GatewayError> {
        let http = upstream::build_client()
            .map_err(|err| GatewayError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            config: ConfigStore::new(data_dir),
            models: ModelCacheStore::new(data_dir),
            history: HistoryStore::new(data_dir),
            tokens: TokenResolver::new(http.clone()),
            http,
        })
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    pub fn history_store(&self) -> &HistoryStore {
        &self.history
    }

    pub fn token_cache(&self) -> &TokenCache {
        self.tokens.cache()
    }
}
