//! Handlers on the public capture listener.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;

use crate::http::server::CaptureState;

/// Body returned for every captured request.
pub const CAPTURE_RESPONSE: &str = "Hello World\nHello Universe";

/// Catch-all: record the request and answer with the fixed greeting.
pub async fn capture_request(
    State(state): State<CaptureState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> &'static str {
    state.pipeline.capture(request, peer).await;
    CAPTURE_RESPONSE
}

/// Number of requests currently held in history.
pub async fn count_requests(State(state): State<CaptureState>) -> String {
    let count = state.history.len();
    tracing::debug!(count, "Request count served");
    format!("Anzahl der Requests: {count}")
}

/// `GET /static/*`: a stored blob, or 404.
pub async fn serve_blob(State(state): State<CaptureState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();
    let stripped = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .and_then(|pq| pq.strip_prefix("/static"))
        .unwrap_or("/");
    parts.uri = match stripped.parse::<Uri>() {
        Ok(uri) => uri,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    match state.blobs.oneshot(Request::from_parts(parts, body)).await {
        Ok(response) => response.into_response(),
        Err(infallible) => match infallible {},
    }
}
