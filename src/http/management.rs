//! Handlers on the management listener: history pages and the live stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream;
use serde::Deserialize;

use crate::broadcast::Subscription;
use crate::http::server::ManagementState;

/// Records per history page.
pub const PAGE_SIZE: i64 = 10;

const INVALID_PAGE: &str = "Ungültige Seitennummer";

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    p: Option<String>,
}

/// `GET /view-requests?p=N`: one page of history, newest first.
pub async fn view_requests(
    State(state): State<ManagementState>,
    Query(query): Query<PageQuery>,
) -> Response {
    let Some(page) = parse_page(query.p.as_deref()) else {
        tracing::debug!(p = ?query.p, "Rejected page number");
        return (StatusCode::BAD_REQUEST, INVALID_PAGE).into_response();
    };

    let (start, end) = page_bounds(page);
    Json(state.history.range(start, end)).into_response()
}

/// `GET /sse`: every record captured from now on, as `message` events.
pub async fn stream_requests(State(state): State<ManagementState>) -> Response {
    let subscription = match Subscription::open(&state.hub) {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!(error = %e, "Cannot open event stream");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server-Sent Events are not supported.",
            )
                .into_response();
        }
    };

    let events = stream::unfold(
        (subscription, state.shutdown.clone()),
        |(mut subscription, mut shutdown)| async move {
            let delivery = subscription.next(&mut shutdown).await?;
            let event = Event::default().event("message").data(&*delivery);
            Some((Ok::<_, Infallible>(event), (subscription, shutdown)))
        },
    );

    let keep_alive = KeepAlive::new().interval(Duration::from_secs(state.keep_alive_secs.max(1)));
    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(events).keep_alive(keep_alive),
    )
        .into_response()
}

/// 1-based page number; absent means the first page.
fn parse_page(raw: Option<&str>) -> Option<i64> {
    match raw {
        None => Some(1),
        Some(raw) => raw.parse::<i64>().ok().filter(|page| *page > 0),
    }
}

fn page_bounds(page: i64) -> (i64, i64) {
    let start = (page - 1).saturating_mul(PAGE_SIZE);
    (start, start.saturating_add(PAGE_SIZE))
}
