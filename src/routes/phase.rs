//! Host-only routes driving the match lifecycle: phase transitions and the
//! exactly-once scoring RPC.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dao::models::MatchRow,
    dto::match_dto::{ScoreRoundRequest, ScoreRoundResponse, StartPhaseRequest},
    error::AppError,
    extractors::Identity,
    services::{
        match_service,
        scoring::{self, ScoreOutcome},
    },
    state::SharedState,
};

/// Configure the host-only phase routes subtree.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/matches/{id}/phase", post(start_phase))
        .route("/api/matches/{id}/score-round", post(score_round))
}

/// Reject callers other than the elected host of `id`.
async fn require_host(state: &SharedState, id: Uuid, uid: &str) -> Result<(), AppError> {
    let match_row = state
        .store()
        .find_match(id)
        .await
        .map_err(crate::error::ServiceError::from)?
        .ok_or_else(|| AppError::NotFound(format!("match `{id}`")))?;
    if match_row.host_uid != uid {
        return Err(AppError::Unauthorized(
            "only the host drives phase transitions".into(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/matches/{id}/phase",
    tag = "phase",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = StartPhaseRequest,
    responses(
        (status = 200, description = "Current match row after the (possibly no-op) transition", body = MatchRow),
        (status = 401, description = "Caller is not the host")
    )
)]
/// Advance the match to the requested phase.
///
/// A duplicate trigger losing the conditional write is not an error; the
/// response carries the row as another trigger left it.
pub async fn start_phase(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Identity(uid): Identity,
    Json(payload): Json<StartPhaseRequest>,
) -> Result<Json<MatchRow>, AppError> {
    require_host(&state, id, &uid).await?;

    let updated =
        match_service::start_phase(state.store(), id, payload.status, payload.question_index)
            .await?;
    let row = match updated {
        Some(row) => row,
        None => state
            .store()
            .find_match(id)
            .await
            .map_err(crate::error::ServiceError::from)?
            .ok_or_else(|| AppError::NotFound(format!("match `{id}`")))?,
    };
    Ok(Json(row))
}

#[utoipa::path(
    post,
    path = "/api/matches/{id}/score-round",
    tag = "phase",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = ScoreRoundRequest,
    responses(
        (status = 200, description = "Round scored, or skipped as already scored", body = ScoreRoundResponse),
        (status = 401, description = "Caller is not the host")
    )
)]
/// Score one round exactly once.
///
/// Concurrent invocations are expected (racing host timers, restarted
/// drivers); losers report `already_scored` with a 200, never an error.
pub async fn score_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Identity(uid): Identity,
    Json(payload): Json<ScoreRoundRequest>,
) -> Result<Json<ScoreRoundResponse>, AppError> {
    require_host(&state, id, &uid).await?;

    let outcome =
        scoring::score_round(state.store(), state.config(), id, payload.question_index).await?;
    let response = match outcome {
        ScoreOutcome::Scored(updates) => ScoreRoundResponse {
            success: true,
            already_scored: false,
            score_updates: updates.into_iter().map(Into::into).collect(),
        },
        ScoreOutcome::AlreadyScored => ScoreRoundResponse {
            success: true,
            already_scored: true,
            score_updates: Vec::new(),
        },
    };
    Ok(Json(response))
}
