use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use unigate_core::Gateway;
use unigate_core::unified::unified_auth_ok;

use crate::respond::{chat_response, error_response};

/// The OpenAI-compatible unified surface. Every route sits behind the
/// shared-key gate; the gate check happens before any upstream call.
pub fn unified_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/unified/v1/models", get(unified_models))
        .route("/unified/v1/chat/completions", post(unified_chat))
        .layer(middleware::from_fn_with_state(gateway.clone(), unified_auth))
        .with_state(gateway)
}

async fn unified_auth(
    State(gateway): State<Arc<Gateway>>,
    request: axum::http::Request<Body>,
    next: Next,
) -> Response {
    let config = match gateway.config_store().load().await {
        Ok(config) => config,
        Err(err) => return error_response(err.into()),
    };
    let bearer = bearer_token(request.headers());
    if !unified_auth_ok(&config, bearer.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized: invalid unified api key" })),
        )
            .into_response();
    }
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let value = value.trim();
    let prefix = "Bearer ";
    if value.len() > prefix.len() && value[..prefix.len()].eq_ignore_ascii_case(prefix) {
        let token = value[prefix.len()..].trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    None
}

async fn unified_models(State(gateway): State<Arc<Gateway>>) -> Response {
    match gateway.unified_models().await {
        Ok(models) => Json(json!({ "object": "list", "data": models })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn unified_chat(State(gateway): State<Arc<Gateway>>, Json(body): Json<Value>) -> Response {
    match gateway.unified_chat(body).await {
        Ok(reply) => chat_response(reply),
        Err(err) => error_response(err),
    }
}
