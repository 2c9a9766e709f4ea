use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{AUTHORIZATION, HeaderValue};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{info, warn};
use unigate_common::{Endpoint, GatewayError};

use crate::Gateway;

/// Channel depth for the streaming relay. Small on purpose: a slow consumer
/// exerts backpressure on the upstream read instead of buffering the stream.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Outcome of a forwarded chat completion.
#[derive(Debug)]
pub enum ChatReply {
    /// Upstream status and parsed JSON body, relayed verbatim. Non-2xx
    /// responses travel this way too so the caller sees the provider's own
    /// error payload.
    Json { status: u16, body: Value },
    /// Live event-stream chunks in upstream arrival order. The receiver
    /// dropping cancels the upstream read.
    Stream { receiver: mpsc::Receiver<Bytes> },
}

/// Strip gateway-internal fields before a body goes upstream: the
/// `endpointId` routing hint, and the `html` rendering field the UI attaches
/// to messages.
pub fn sanitize_chat_body(mut body: Value) -> Value {
    if let Some(fields) = body.as_object_mut() {
        fields.remove("endpointId");
        if let Some(messages) = fields.get_mut("messages").and_then(Value::as_array_mut) {
            for message in messages {
                if let Some(message) = message.as_object_mut() {
                    message.remove("html");
                }
            }
        }
    }
    body
}

impl Gateway {
    /// Forward one inbound chat/completions request to the endpoint it
    /// addresses (explicit `endpointId` hint, else the current endpoint).
    pub async fn proxy_chat(&self, body: Value) -> Result<ChatReply, GatewayError> {
        let endpoint_id = body
            .get("endpointId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let endpoint = self.resolve_endpoint(endpoint_id.as_deref()).await?;
        self.forward_chat(&endpoint, body).await
    }

    /// The single upstream call shared by the direct and unified paths. One
    /// call per inbound request; no retries.
    pub(crate) async fn forward_chat(
        &self,
        endpoint: &Endpoint,
        body: Value,
    ) -> Result<ChatReply, GatewayError> {
        let payload = sanitize_chat_body(body);
        let wants_stream = payload
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let token = self.tokens.resolve(endpoint).await?;
        let url = format!("{}/chat/completions", endpoint.trimmed_base_url());
        info!(endpoint = %endpoint.name, url = %url, stream = wants_stream, "forwarding chat completion");

        let mut request = self.http.post(&url).json(&payload);
        if let Some(token) = &token
            && let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}"))
        {
            request = request.header(AUTHORIZATION, value);
        }
        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.json::<Value>().await.unwrap_or_else(|_| {
                json!({"error": "failed to parse upstream error response"})
            });
            warn!(endpoint = %endpoint.name, status, "upstream chat error");
            return Ok(ChatReply::Json { status, body });
        }

        if !wants_stream {
            let body = response.json::<Value>().await.map_err(|err| {
                GatewayError::Transport(format!("bad upstream response: {err}"))
            })?;
            return Ok(ChatReply::Json { status, body });
        }

        // Byte-for-byte relay: chunks cross the channel in arrival order,
        // without reassembly. When the downstream side goes away the send
        // fails and the copy loop stops, cancelling the upstream read.
        let (tx, rx) = mpsc::channel::<Bytes>(STREAM_CHANNEL_CAPACITY);
        let endpoint_name = endpoint.name.clone();
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            while let Some(item) = stream.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        warn!(endpoint = %endpoint_name, error = %err, "upstream stream ended with error");
                        break;
                    }
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        Ok(ChatReply::Stream { receiver: rx })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sanitize_strips_routing_hint_and_render_fields() {
        let body = json!({
            "endpointId": "123",
            "model": "gpt-4",
            "temperature": 0.2,
            "messages": [
                {"role": "user", "content": "hi", "html": "<p>hi</p>"},
                {"role": "assistant", "content": "hello"}
            ]
        });
        let cleaned = sanitize_chat_body(body);
        assert!(cleaned.get("endpointId").is_none());
        assert!(cleaned["messages"][0].get("html").is_none());
        // Everything the upstream understands passes through untouched.
        assert_eq!(cleaned["temperature"], json!(0.2));
        assert_eq!(cleaned["messages"][0]["content"], "hi");
        assert_eq!(cleaned["messages"][1]["content"], "hello");
    }

    #[test]
    fn sanitize_leaves_non_object_bodies_alone() {
        let body = json!(["not", "an", "object"]);
        assert_eq!(sanitize_chat_body(body.clone()), body);
    }
}
