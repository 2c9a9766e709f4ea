use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::info;
use unigate_common::{AuthKind, Endpoint, GatewayError};

/// A token is reused only while it outlives this buffer, so callers never
/// hold a token that expires mid-request.
const REUSE_BUFFER: Duration = Duration::from_secs(300);

const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// In-memory OAuth token cache, keyed by endpoint id. Never persisted:
/// losing it on restart forces a clean client-credentials fetch, which is
/// the intended security property.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    /// A cached token, if one exists and its expiry clears the reuse buffer.
    pub fn fresh(&self, endpoint_id: &str, now: SystemTime) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(endpoint_id)?;
        (entry.expires_at > now + REUSE_BUFFER).then(|| entry.token.clone())
    }

    pub fn store(&self, endpoint_id: &str, token: String, expires_at: SystemTime) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(endpoint_id.to_string(), CachedToken { token, expires_at });
    }

    /// Drop the token for an endpoint, e.g. after its credentials changed.
    pub fn invalidate(&self, endpoint_id: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(endpoint_id);
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Resolves an endpoint's credential configuration into a usable bearer
/// token. Api-key endpoints resolve without I/O; oauth2 endpoints go
/// through the client-credentials flow with the cache in front.
pub struct TokenResolver {
    cache: TokenCache,
    http: wreq::Client,
}

impl TokenResolver {
    pub fn new(http: wreq::Client) -> Self {
        Self {
            cache: TokenCache::default(),
            http,
        }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub async fn resolve(&self, endpoint: &Endpoint) -> Result<Option<String>, GatewayError> {
        match endpoint.auth_type {
            AuthKind::ApiKey => Ok(endpoint.api_key.clone()),
            AuthKind::Oauth2 => self.client_credentials_token(endpoint).await.map(Some),
        }
    }

    /// Concurrent callers racing past a stale-cache check may each issue a
    /// redundant grant; OAuth providers tolerate duplicate client-credentials
    /// fetches, so there is no single-flight guard here.
    async fn client_credentials_token(&self, endpoint: &Endpoint) -> Result<String, GatewayError> {
        let now = SystemTime::now();
        if let Some(token) = self.cache.fresh(&endpoint.id, now) {
            return Ok(token);
        }

        let token_url = required_field(endpoint, endpoint.token_url.as_deref(), "tokenUrl")?;
        let client_id = required_field(endpoint, endpoint.client_id.as_deref(), "clientId")?;
        let client_secret =
            required_field(endpoint, endpoint.client_secret.as_deref(), "clientSecret")?;

        info!(endpoint = %endpoint.name, "refreshing oauth token");
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id,
            client_secret,
            scope: endpoint.scope.as_deref().filter(|scope| !scope.is_empty()),
        };
        let response = self
            .http
            .post(token_url)
            .form(&request)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(format!("token endpoint unreachable: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response
            .json::<TokenResponse>()
            .await
            .map_err(|err| GatewayError::Transport(format!("bad token response: {err}")))?;
        let expires_in = payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let expires_at = now + Duration::from_secs(expires_in);
        self.cache
            .store(&endpoint.id, payload.access_token.clone(), expires_at);

        Ok(payload.access_token)
    }
}

impl crate::Gateway {
    /// Resolve the bearer token for an endpoint through the gateway's
    /// shared resolver and cache.
    pub async fn resolve_token(&self, endpoint: &Endpoint) -> Result<Option<String>, GatewayError> {
        self.tokens.resolve(endpoint).await
    }
}

fn required_field<'a>(
    endpoint: &Endpoint,
    value: Option<&'a str>,
    field: &str,
) -> Result<&'a str, GatewayError> {
    value.filter(|value| !value.is_empty()).ok_or_else(|| {
        GatewayError::Config(format!(
            "oauth2 endpoint '{}' is missing {field}",
            endpoint.name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_requires_expiry_beyond_buffer() {
        let cache = TokenCache::default();
        let now = SystemTime::now();

        cache.store("ep", "short-lived".to_string(), now + Duration::from_secs(200));
        assert_eq!(cache.fresh("ep", now), None);

        cache.store("ep", "long-lived".to_string(), now + Duration::from_secs(400));
        assert_eq!(cache.fresh("ep", now).as_deref(), Some("long-lived"));
    }

    #[test]
    fn exact_buffer_boundary_is_stale() {
        let cache = TokenCache::default();
        let now = SystemTime::now();
        cache.store("ep", "edge".to_string(), now + REUSE_BUFFER);
        assert_eq!(cache.fresh("ep", now), None);
    }

    #[test]
    fn invalidate_drops_entry() {
        let cache = TokenCache::default();
        let now = SystemTime::now();
        cache.store("ep", "tok".to_string(), now + Duration::from_secs(7200));
        cache.invalidate("ep");
        assert_eq!(cache.fresh("ep", now), None);
    }

    #[test]
    fn scope_omitted_from_grant_when_absent() {
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: "id",
            client_secret: "secret",
            scope: None,
        };
        let fields = serde_json::to_value(&request).unwrap();
        assert!(fields.get("scope").is_none());

        let request = TokenRequest {
            scope: Some("read"),
            ..request
        };
        let fields = serde_json::to_value(&request).unwrap();
        assert_eq!(fields["scope"], "read");
        assert_eq!(fields["grant_type"], "client_credentials");
    }
}
