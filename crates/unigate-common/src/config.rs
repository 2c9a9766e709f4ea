use serde::{Deserialize, Deserializer, Serialize};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthKind {
    #[default]
    ApiKey,
    Oauth2,
}

/// A configured upstream chat-completion provider.
///
/// Exactly one auth kind's fields are meaningful at token-resolve time; the
/// other set may still be stored and is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub auth_type: AuthKind,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Endpoint {
    /// Base URL with trailing slashes removed, safe to join paths onto.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn has_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

/// The full durable gateway configuration, loaded from disk at the start of
/// each request cycle and rewritten on every mutation. No authoritative
/// in-memory copy is kept; concurrent writers race and the last write wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub current_endpoint_id: Option<String>,
    #[serde(default)]
    pub unified_api_key: Option<String>,
}

impl GatewayConfig {
    /// Endpoint for an explicit id, else the current endpoint, else the
    /// first configured one. An explicit id that matches nothing resolves to
    /// none rather than falling back.
    pub fn resolve_endpoint(&self, id: Option<&str>) -> Option<&Endpoint> {
        if let Some(id) = id {
            return self.endpoints.iter().find(|endpoint| endpoint.id == id);
        }
        self.endpoints
            .iter()
            .find(|endpoint| Some(endpoint.id.as_str()) == self.current_endpoint_id.as_deref())
            .or_else(|| self.endpoints.first())
    }

    pub fn endpoint_by_name(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.name.eq_ignore_ascii_case(name))
    }
}

/// Create-or-merge input for an endpoint.
///
/// Credential fields distinguish "omitted" (keep the stored value) from an
/// explicit JSON `null` (clear it) via the double-option pattern; a present
/// but blank value also keeps the stored one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUpsert {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth_type: Option<AuthKind>,
    #[serde(default, deserialize_with = "double_option")]
    pub api_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub token_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub client_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub client_secret: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub scope: Option<Option<String>>,
}

impl EndpointUpsert {
    /// Merge into an existing endpoint. Returns true when any of the OAuth
    /// credential fields (tokenUrl/clientId/clientSecret) actually changed,
    /// so the caller can drop the endpoint's cached token.
    pub fn apply_to(&self, endpoint: &mut Endpoint) -> bool {
        if let Some(name) = &self.name
            && !name.trim().is_empty()
        {
            endpoint.name = name.trim().to_string();
        }
        if let Some(base_url) = &self.base_url
            && !base_url.trim().is_empty()
        {
            endpoint.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(auth_type) = self.auth_type {
            endpoint.auth_type = auth_type;
        }

        apply_secret(&mut endpoint.api_key, &self.api_key);
        apply_secret(&mut endpoint.scope, &self.scope);

        let mut credentials_changed = false;
        credentials_changed |= apply_secret(&mut endpoint.token_url, &self.token_url);
        credentials_changed |= apply_secret(&mut endpoint.client_id, &self.client_id);
        credentials_changed |= apply_secret(&mut endpoint.client_secret, &self.client_secret);
        credentials_changed
    }

    /// Consume the patch into a brand-new endpoint record.
    pub fn into_new_endpoint(self, id: String) -> Result<Endpoint, GatewayError> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| GatewayError::Validation("name is required".to_string()))?
            .to_string();
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GatewayError::Validation("baseUrl is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        Ok(Endpoint {
            id,
            name,
            base_url,
            auth_type: self.auth_type.unwrap_or_default(),
            api_key: flatten_secret(self.api_key),
            token_url: flatten_secret(self.token_url),
            client_id: flatten_secret(self.client_id),
            client_secret: flatten_secret(self.client_secret),
            scope: flatten_secret(self.scope),
        })
    }
}

fn apply_secret(slot: &mut Option<String>, patch: &Option<Option<String>>) -> bool {
    match patch {
        None => false,
        Some(None) => {
            let changed = slot.is_some();
            *slot = None;
            changed
        }
        Some(Some(value)) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return false;
            }
            let changed = slot.as_deref() != Some(trimmed);
            *slot = Some(trimmed.to_string());
            changed
        }
    }
}

fn flatten_secret(patch: Option<Option<String>>) -> Option<String> {
    patch
        .flatten()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Plain `Option<Option<T>>` cannot tell JSON `null` apart from a missing
/// field; this forces a present field (including `null`) into `Some(inner)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
