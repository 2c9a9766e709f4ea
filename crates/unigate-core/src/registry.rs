use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::info;
use unigate_common::{Endpoint, EndpointUpsert, GatewayError};

use crate::Gateway;

/// What `GET /api/endpoints` exposes: secrets are masked down to a single
/// presence flag, the raw key never leaves the server process.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub has_key: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointListing {
    pub endpoints: Vec<EndpointSummary>,
    pub current_endpoint_id: Option<String>,
}

impl Gateway {
    pub async fn list_endpoints(&self) -> Result<EndpointListing, GatewayError> {
        let config = self.config.load().await?;
        let endpoints = config
            .endpoints
            .iter()
            .map(|endpoint| EndpointSummary {
                id: endpoint.id.clone(),
                name: endpoint.name.clone(),
                base_url: endpoint.base_url.clone(),
                has_key: endpoint.has_key(),
            })
            .collect();
        Ok(EndpointListing {
            endpoints,
            current_endpoint_id: config.current_endpoint_id,
        })
    }

    /// Resolve an endpoint for request handling: explicit id, else the
    /// current endpoint, else the first configured one.
    pub async fn resolve_endpoint(&self, id: Option<&str>) -> Result<Endpoint, GatewayError> {
        let config = self.config.load().await?;
        config
            .resolve_endpoint(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound("no endpoint configured".to_string()))
    }

    /// Create or merge an endpoint record. A merge that changes OAuth
    /// credentials drops the endpoint's cached token.
    pub async fn upsert_endpoint(&self, patch: EndpointUpsert) -> Result<(), GatewayError> {
        let mut config = self.config.load().await?;

        let existing = patch
            .id
            .as_deref()
            .and_then(|id| config.endpoints.iter().position(|endpoint| endpoint.id == id));

        match existing {
            Some(index) => {
                let endpoint = &mut config.endpoints[index];
                let credentials_changed = patch.apply_to(endpoint);
                if credentials_changed {
                    self.tokens.cache().invalidate(&endpoint.id);
                    info!(endpoint = %endpoint.name, "oauth credentials changed, token cache dropped");
                }
            }
            None => {
                let id = patch
                    .id
                    .clone()
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(timestamp_id);
                let endpoint = patch.into_new_endpoint(id)?;
                info!(endpoint = %endpoint.name, id = %endpoint.id, "endpoint created");
                config.endpoints.push(endpoint);
                if config.endpoints.len() == 1 {
                    config.current_endpoint_id = Some(config.endpoints[0].id.clone());
                }
            }
        }

        self.config.save(&config).await?;
        Ok(())
    }

    /// Remove an endpoint; re-elect the first remaining endpoint as current
    /// when the deleted one held that role. Its cached token is evicted.
    pub async fn delete_endpoint(&self, id: &str) -> Result<(), GatewayError> {
        let mut config = self.config.load().await?;
        config.endpoints.retain(|endpoint| endpoint.id != id);
        if config.current_endpoint_id.as_deref() == Some(id) {
            config.current_endpoint_id =
                config.endpoints.first().map(|endpoint| endpoint.id.clone());
        }
        self.tokens.cache().invalidate(id);
        self.config.save(&config).await?;
        Ok(())
    }

    /// Set the current endpoint without checking the id exists; resolution
    /// validates later.
    pub async fn select_endpoint(&self, id: Option<String>) -> Result<(), GatewayError> {
        let mut config = self.config.load().await?;
        config.current_endpoint_id = id;
        self.config.save(&config).await?;
        Ok(())
    }
}

fn timestamp_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
