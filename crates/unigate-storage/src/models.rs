use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::StorageError;

/// Durable per-endpoint model-catalog cache, one JSON file mapping endpoint
/// id to the list of model descriptors last fetched for it. Entries are
/// replaced wholesale, never merged.
pub struct ModelCacheStore {
    path: PathBuf,
}

impl ModelCacheStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("models.json"),
        }
    }

    /// Missing or corrupt cache file reads as empty.
    pub async fn load(&self) -> HashMap<String, Vec<Value>> {
        let Ok(bytes) = tokio::fs::read(&self.path).await else {
            return HashMap::new();
        };
        match serde_json::from_slice(&bytes) {
            Ok(cache) => cache,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "model cache unreadable, treating as empty");
                HashMap::new()
            }
        }
    }

    pub async fn save(&self, cache: &HashMap<String, Vec<Value>>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(cache)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
