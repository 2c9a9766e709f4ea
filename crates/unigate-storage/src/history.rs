use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::StorageError;

/// Chat-history persistence. The gateway treats the chat list as an opaque
/// blob owned by the UI; it is read and written verbatim.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("chats.json"),
        }
    }

    pub async fn load(&self) -> Value {
        let Ok(bytes) = tokio::fs::read(&self.path).await else {
            return Value::Array(Vec::new());
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::Array(Vec::new()))
    }

    pub async fn save(&self, chats: &Value) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(chats)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn defaults_to_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        assert_eq!(store.load().await, json!([]));
    }

    #[tokio::test]
    async fn blob_round_trips_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let blob = json!([{"id": "c1", "messages": [{"role": "user", "content": "hi"}]}]);
        store.save(&blob).await.unwrap();
        assert_eq!(store.load().await, blob);
    }
}
