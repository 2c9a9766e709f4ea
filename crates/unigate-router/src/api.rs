use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};
use unigate_common::EndpointUpsert;
use unigate_core::Gateway;

use crate::respond::{chat_response, error_response};

/// The operator-facing API: endpoint CRUD, catalog queries, the direct chat
/// proxy, chat-history persistence and client log ingestion.
pub fn api_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/api/endpoints", get(list_endpoints).post(upsert_endpoint))
        .route("/api/endpoints/select", post(select_endpoint))
        .route("/api/endpoints/{id}", delete(delete_endpoint))
        .route("/api/models", get(list_models))
        .route("/api/models/refresh", post(refresh_models))
        .route("/api/chat", post(chat))
        .route("/api/history", get(get_history).post(save_history))
        .route("/api/logs", post(ingest_client_log))
        .with_state(gateway)
}

async fn list_endpoints(State(gateway): State<Arc<Gateway>>) -> Response {
    match gateway.list_endpoints().await {
        Ok(listing) => Json(listing).into_response(),
        Err(err) => error_response(err),
    }
}

async fn upsert_endpoint(
    State(gateway): State<Arc<Gateway>>,
    Json(patch): Json<EndpointUpsert>,
) -> Response {
    match gateway.upsert_endpoint(patch).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_endpoint(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
) -> Response {
    match gateway.delete_endpoint(&id).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(default)]
    id: Option<String>,
}

async fn select_endpoint(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<SelectBody>,
) -> Response {
    match gateway.select_endpoint(body.id).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelsQuery {
    #[serde(default)]
    endpoint_id: Option<String>,
}

async fn list_models(
    State(gateway): State<Arc<Gateway>>,
    Query(query): Query<ModelsQuery>,
) -> Response {
    let endpoint_id = query.endpoint_id.as_deref().filter(|id| !id.is_empty());
    match gateway.models(endpoint_id).await {
        Ok(models) => Json(json!({ "object": "list", "data": models })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn refresh_models(State(gateway): State<Arc<Gateway>>) -> Response {
    match gateway.refresh_all_models().await {
        Ok(results) => Json(json!({ "success": true, "results": results })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn chat(State(gateway): State<Arc<Gateway>>, Json(body): Json<Value>) -> Response {
    match gateway.proxy_chat(body).await {
        Ok(reply) => chat_response(reply),
        Err(err) => error_response(err),
    }
}

async fn get_history(State(gateway): State<Arc<Gateway>>) -> Response {
    Json(gateway.history_store().load().await).into_response()
}

async fn save_history(
    State(gateway): State<Arc<Gateway>>,
    Json(chats): Json<Value>,
) -> Response {
    match gateway.history_store().save(&chats).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err) => {
            warn!(error = %err, "history save failed");
            error_response(err.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClientLogEntry {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Option<Value>,
}

/// Replays browser-side log records into the gateway's own subscriber so a
/// single log stream covers both halves of the app.
async fn ingest_client_log(Json(entry): Json<ClientLogEntry>) -> Response {
    let level = entry.level.as_deref().unwrap_or("INFO");
    match level.to_ascii_uppercase().as_str() {
        "ERROR" => error!(target: "client", details = ?entry.details, "{}", entry.message),
        "WARN" | "WARNING" => warn!(target: "client", details = ?entry.details, "{}", entry.message),
        "DEBUG" => debug!(target: "client", details = ?entry.details, "{}", entry.message),
        _ => info!(target: "client", details = ?entry.details, "{}", entry.message),
    }
    Json(json!({ "success": true })).into_response()
}
