//! Per-match SSE change feed.

use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, ServiceError},
    services::sse_service,
    state::SharedState,
};

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::new().route("/api/matches/{id}/events", get(match_events))
}

#[utoipa::path(
    get,
    path = "/api/matches/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Row-change stream for one match", content_type = "text/event-stream", body = String),
        (status = 404, description = "No such match")
    )
)]
/// Stream row-level change events scoped to one match.
///
/// The first event is a handshake; clients fetch the bulk snapshot after
/// receiving it so nothing lands in the gap between subscribe and fetch.
pub async fn match_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state
        .store()
        .find_match(id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| AppError::NotFound(format!("match `{id}`")))?;

    let receiver = state.store().subscribe(id);
    info!(match_id = %id, "new SSE connection");
    Ok(sse_service::to_sse_stream(receiver, id))
}
