use std::path::{Path, PathBuf};

use tracing::{info, warn};
use unigate_common::GatewayConfig;

use crate::StorageError;

/// Durable gateway configuration, one JSON file.
///
/// Every load reads the file fresh; every mutation rewrites it whole. Two
/// concurrent writers race and the last write wins, which is acceptable for
/// the single-operator deployment this gateway targets.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("config.json"),
        }
    }

    /// Read the config. A missing or corrupt file yields an empty config
    /// rather than an error. The first successful read of a file that has no
    /// unified API key generates one and persists it immediately; it is
    /// never regenerated after that.
    pub async fn load(&self) -> Result<GatewayConfig, StorageError> {
        let Ok(bytes) = tokio::fs::read(&self.path).await else {
            return Ok(GatewayConfig::default());
        };
        let mut config = match serde_json::from_slice::<GatewayConfig>(&bytes) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "config file unreadable, treating as empty");
                return Ok(GatewayConfig::default());
            }
        };

        if config.unified_api_key.is_none() {
            config.unified_api_key = Some(generate_unified_key());
            self.save(&config).await?;
            info!("generated unified api key");
        }

        Ok(config)
    }

    pub async fn save(&self, config: &GatewayConfig) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(config)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

fn generate_unified_key() -> String {
    format!("ug-{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use unigate_common::{AuthKind, Endpoint};

    use super::*;

    fn endpoint(id: &str) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            name: format!("ep-{id}"),
            base_url: "http://localhost:9999/v1".to_string(),
            auth_type: AuthKind::ApiKey,
            api_key: Some("sk-test".to_string()),
            token_url: None,
            client_id: None,
            client_secret: None,
            scope: None,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let config = store.load().await.unwrap();
        assert!(config.endpoints.is_empty());
        // No file on disk yet, so no key is minted and the unified gate
        // stays open.
        assert!(config.unified_api_key.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), b"{not json").unwrap();
        let store = ConfigStore::new(dir.path());
        let config = store.load().await.unwrap();
        assert!(config.endpoints.is_empty());
    }

    #[tokio::test]
    async fn unified_key_minted_once_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        let mut config = GatewayConfig::default();
        config.endpoints.push(endpoint("1"));
        store.save(&config).await.unwrap();

        let loaded = store.load().await.unwrap();
        let key = loaded.unified_api_key.clone().unwrap();
        assert!(key.starts_with("ug-"));

        let again = store.load().await.unwrap();
        assert_eq!(again.unified_api_key.as_deref(), Some(key.as_str()));
    }

    #[tokio::test]
    async fn save_then_load_round_trips_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        let config = GatewayConfig {
            endpoints: vec![endpoint("a"), endpoint("b")],
            current_endpoint_id: Some("b".to_string()),
            unified_api_key: Some("ug-fixed".to_string()),
        };
        store.save(&config).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.endpoints.len(), 2);
        assert_eq!(loaded.current_endpoint_id.as_deref(), Some("b"));
        assert_eq!(loaded.unified_api_key.as_deref(), Some("ug-fixed"));
        assert_eq!(loaded.endpoints[0].api_key.as_deref(), Some("sk-test"));
    }
}
