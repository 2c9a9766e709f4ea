use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use unigate_common::GatewayError;
use unigate_core::ChatReply;

/// Every handler failure becomes structured JSON with a mapped status; no
/// error escapes as a bare 500 page or tears down the process.
pub(crate) fn error_response(err: GatewayError) -> Response {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// Turn a forwarded chat outcome into a downstream response: JSON replies
/// mirror the upstream status, stream replies switch to event-stream framing
/// and end when the relay channel closes.
pub(crate) fn chat_response(reply: ChatReply) -> Response {
    match reply {
        ChatReply::Json { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(body)).into_response()
        }
        ChatReply::Stream { receiver } => {
            let stream = ReceiverStream::new(receiver).map(Ok::<_, Infallible>);
            let mut response = Response::new(Body::from_stream(stream));
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/event-stream"),
            );
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
            response
        }
    }
}
