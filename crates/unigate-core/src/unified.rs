use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::future::join_all;
use http::header::{AUTHORIZATION, HeaderValue};
use serde_json::{Value, json};
use tracing::{info, warn};
use unigate_common::{Endpoint, GatewayConfig, GatewayError};

use crate::forward::ChatReply;
use crate::Gateway;

/// Whether a request may pass the unified gate. The gate is open until a
/// shared key has been generated; after that the presented bearer token must
/// match exactly.
pub fn unified_auth_ok(config: &GatewayConfig, bearer: Option<&str>) -> bool {
    match config.unified_api_key.as_deref() {
        None => true,
        Some(expected) => bearer == Some(expected),
    }
}

/// Split a composite `"<endpointName>/<modelId>"` on the first slash; model
/// ids that themselves contain `/` keep their remaining segments intact.
pub fn split_composite_id(model: &str) -> Option<(&str, &str)> {
    model.split_once('/')
}

impl Gateway {
    /// Aggregate every endpoint's live `/models` listing into one namespace.
    /// The catalog cache is bypassed for call-time freshness. A failing
    /// endpoint is logged and omitted; the aggregate itself never fails
    /// because one provider did.
    pub async fn unified_models(&self) -> Result<Vec<Value>, GatewayError> {
        let config = self.config.load().await?;

        let fetches = config.endpoints.iter().map(|endpoint| async move {
            (endpoint, self.composite_models_for(endpoint).await)
        });

        let mut all = Vec::new();
        for (endpoint, outcome) in join_all(fetches).await {
            match outcome {
                Ok(mut models) => {
                    info!(endpoint = %endpoint.name, count = models.len(), "aggregated models");
                    all.append(&mut models);
                }
                Err(err) => {
                    warn!(endpoint = %endpoint.name, error = %err, "unified model fetch failed, omitting endpoint");
                }
            }
        }
        Ok(all)
    }

    async fn composite_models_for(&self, endpoint: &Endpoint) -> Result<Vec<Value>, GatewayError> {
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
        let now = unix_now();
        let models = payload
            .get("data")
            .and_then(Value::as_array)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|record| {
                        let real_id = record
                            .get("id")
                            .or_else(|| record.get("model"))?
                            .as_str()?;
                        Some(json!({
                            "id": format!("{}/{real_id}", endpoint.name),
                            "object": "model",
                            "created": record.get("created").cloned().unwrap_or_else(|| json!(now)),
                            "owned_by": endpoint.name,
                        }))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    /// Route a unified chat completion by its composite model id. On the
    /// non-streaming success path the echoed `model` field is rewritten back
    /// to the composite id so the caller's namespace holds end to end.
    pub async fn unified_chat(&self, mut body: Value) -> Result<ChatReply, GatewayError> {
        let composite = body
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Validation("model is required".to_string()))?;
        let (endpoint_name, real_model) = split_composite_id(&composite).ok_or_else(|| {
            GatewayError::Validation(
                "invalid model format, expected \"EndpointName/ModelID\"".to_string(),
            )
        })?;

        let config = self.config.load().await?;
        let endpoint = config
            .endpoint_by_name(endpoint_name)
            .cloned()
            .ok_or_else(|| {
                GatewayError::NotFound(format!("endpoint '{endpoint_name}' not found"))
            })?;

        if let Some(fields) = body.as_object_mut() {
            fields.insert("model".to_string(), json!(real_model));
        }

        let reply = self.forward_chat(&endpoint, body).await?;
        match reply {
            ChatReply::Json { status, mut body } if (200..300).contains(&status) => {
                if let Some(fields) = body.as_object_mut()
                    && fields.contains_key("model")
                {
                    fields.insert("model".to_string(), json!(composite));
                }
                Ok(ChatReply::Json { status, body })
            }
            other => Ok(other),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_id_splits_on_first_slash_only() {
        assert_eq!(
            split_composite_id("Groq/llama-3.1-70b"),
            Some(("Groq", "llama-3.1-70b"))
        );
        assert_eq!(
            split_composite_id("OpenRouter/meta/llama-3-8b"),
            Some(("OpenRouter", "meta/llama-3-8b"))
        );
        assert_eq!(split_composite_id("gpt-4"), None);
    }

    #[test]
    fn gate_open_until_key_exists() {
        let mut config = GatewayConfig::default();
        assert!(unified_auth_ok(&config, None));
        assert!(unified_auth_ok(&config, Some("anything")));

        config.unified_api_key = Some("ug-secret".to_string());
        assert!(!unified_auth_ok(&config, None));
        assert!(!unified_auth_ok(&config, Some("wrong")));
        assert!(unified_auth_ok(&config, Some("ug-secret")));
    }
}
