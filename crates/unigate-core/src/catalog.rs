use std::collections::BTreeMap;

use futures_util::future::join_all;
use http::header::{AUTHORIZATION, HeaderValue};
use serde_json::Value;
use tracing::{info, warn};
use unigate_common::{Endpoint, GatewayError};

use crate::Gateway;

/// The gateway routes interactive chat completions only; models whose id
/// contains any of these never belong in the catalog.
const MODEL_ID_DENYLIST: &[&str] = &[
    "embed",
    "audio",
    "tts",
    "whisper",
    "dall-e",
    "moderation",
    "realtime",
];

/// Normalize and filter a raw upstream `/models` listing: records missing
/// `id` but carrying `model` get `model` promoted into `id`, records with no
/// usable id are dropped, and denylisted ids are filtered out. Idempotent.
pub fn filter_chat_models(records: Vec<Value>) -> Vec<Value> {
    records
        .into_iter()
        .filter_map(|mut record| {
            let fields = record.as_object_mut()?;
            if !fields.contains_key("id")
                && let Some(model) = fields.get("model").cloned()
            {
                fields.insert("id".to_string(), model);
            }
            let id = fields.get("id")?.as_str()?.to_ascii_lowercase();
            if MODEL_ID_DENYLIST.iter().any(|needle| id.contains(needle)) {
                return None;
            }
            Some(record)
        })
        .collect()
}

impl Gateway {
    /// Serve the model catalog for an endpoint: the durable cache wins when
    /// it holds a non-empty entry (no TTL, staleness is resolved only by an
    /// explicit refresh); otherwise fetch live and store the result.
    pub async fn models(&self, endpoint_id: Option<&str>) -> Result<Vec<Value>, GatewayError> {
        let config = self.config.load().await?;
        let lookup_id = endpoint_id
            .map(str::to_string)
            .or_else(|| config.current_endpoint_id.clone());

        let mut cache = self.models.load().await;
        if let Some(id) = &lookup_id
            && let Some(models) = cache.get(id)
            && !models.is_empty()
        {
            info!(endpoint_id = %id, "serving models from cache");
            return Ok(models.clone());
        }

        let endpoint = config
            .resolve_endpoint(endpoint_id)
            .ok_or_else(|| GatewayError::NotFound("no endpoint configured".to_string()))?;
        info!(endpoint = %endpoint.name, "model cache miss, fetching live");
        let models = self.fetch_models_live(endpoint).await?;

        cache.insert(endpoint.id.clone(), models.clone());
        self.models.save(&cache).await?;
        Ok(models)
    }

    /// One authenticated `GET <baseUrl>/models` against a single endpoint,
    /// filtered down to chat-capable records.
    pub async fn fetch_models_live(&self, endpoint: &Endpoint) -> Result<Vec<Value>, GatewayError> {
        let token = self.tokens.resolve(endpoint).await?;
        let url = format!("{}/models", endpoint.trimmed_base_url());

        let mut request = self.http.get(&url);
        if let Some(token) = &token
            && let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}"))
        {
            request = request.header(AUTHORIZATION, value);
        }
        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::Transport(format!("bad models response: {err}")))?;
        let records = payload
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(filter_chat_models(records))
    }

    /// Fetch every endpoint's catalog concurrently. Failures are isolated
    /// per endpoint and reported in the returned map; successes overwrite
    /// their cache entries, and the cache file is written once after all
    /// fetches settle.
    pub async fn refresh_all_models(&self) -> Result<BTreeMap<String, String>, GatewayError> {
        let config = self.config.load().await?;
        let mut cache = self.models.load().await;

        info!(endpoints = config.endpoints.len(), "refreshing all model catalogs");
        let fetches = config.endpoints.iter().map(|endpoint| async move {
            (endpoint, self.fetch_models_live(endpoint).await)
        });

        let mut results = BTreeMap::new();
        for (endpoint, outcome) in join_all(fetches).await {
            match outcome {
                Ok(models) => {
                    info!(endpoint = %endpoint.name, count = models.len(), "catalog refreshed");
                    cache.insert(endpoint.id.clone(), models);
                    results.insert(endpoint.name.clone(), "Success".to_string());
                }
                Err(err) => {
                    warn!(endpoint = %endpoint.name, error = %err, "catalog refresh failed");
                    results.insert(endpoint.name.clone(), format!("Failed: {err}"));
                }
            }
        }

        self.models.save(&cache).await?;
        Ok(results)
    }
}
