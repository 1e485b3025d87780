//! Match lifecycle routes: creation, joining, readiness, answers, solutions,
//! and anonymous identity issuance.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dao::models::{AnswerRow, PlayerRow},
    dto::match_dto::{
        CreateMatchRequest, IdentityResponse, JoinMatchRequest, MatchView, ReadyRequest,
        SolutionView, SubmitAnswerRequest,
    },
    error::AppError,
    extractors::Identity,
    services::{
        identity::{AnonymousIdentity, IdentityProvider},
        match_service,
    },
    state::SharedState,
};

/// Configure the match lifecycle routes subtree.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/anonymous", post(sign_in_anonymously))
        .route("/api/matches", post(create_match))
        .route("/api/matches/{id}", get(get_match))
        .route("/api/matches/{id}/join", post(join_match))
        .route("/api/matches/{id}/ready", post(set_ready))
        .route("/api/matches/{id}/answers", post(submit_answer))
        .route("/api/matches/{id}/solutions/{index}", get(get_solution))
}

#[utoipa::path(
    post,
    path = "/api/auth/anonymous",
    tag = "auth",
    responses((status = 200, description = "Fresh anonymous identity", body = IdentityResponse))
)]
/// Mint an opaque anonymous identity for a new client session.
pub async fn sign_in_anonymously() -> Json<IdentityResponse> {
    // One provider per session; the endpoint is the session boundary here.
    let id = AnonymousIdentity::new().sign_in_anonymously();
    Json(IdentityResponse { id })
}

#[utoipa::path(
    post,
    path = "/api/matches",
    tag = "match",
    request_body = CreateMatchRequest,
    responses(
        (status = 200, description = "Match created, creator joined as host", body = MatchView),
        (status = 400, description = "Invalid quiz or timer")
    )
)]
/// Create a match from a quiz document; the caller becomes host and first
/// player.
pub async fn create_match(
    State(state): State<SharedState>,
    Identity(uid): Identity,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<Json<MatchView>, AppError> {
    let view = match_service::create_match(
        state.store(),
        payload,
        uid,
        state.config().default_timer_seconds,
    )
    .await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/api/matches/{id}",
    tag = "match",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Bulk match snapshot", body = MatchView),
        (status = 404, description = "No such match")
    )
)]
/// Fetch the bulk snapshot a client loads on connect or reconnect.
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchView>, AppError> {
    let view = match_service::match_view(state.store(), id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/matches/{id}/join",
    tag = "match",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = JoinMatchRequest,
    responses(
        (status = 200, description = "Joined as second player", body = PlayerRow),
        (status = 409, description = "Match full or already joined")
    )
)]
/// Join an existing match as the second player.
pub async fn join_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Identity(uid): Identity,
    Valid(Json(payload)): Valid<Json<JoinMatchRequest>>,
) -> Result<Json<PlayerRow>, AppError> {
    let player = match_service::join_match(state.store(), id, uid, payload.name).await?;
    Ok(Json(player))
}

#[utoipa::path(
    post,
    path = "/api/matches/{id}/ready",
    tag = "match",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = ReadyRequest,
    responses(
        (status = 200, description = "Readiness updated", body = PlayerRow),
        (status = 404, description = "Player not in match")
    )
)]
/// Flip the caller's phase-dependent ready flag.
pub async fn set_ready(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Identity(uid): Identity,
    Json(payload): Json<ReadyRequest>,
) -> Result<Json<PlayerRow>, AppError> {
    let player = match_service::set_ready(state.store(), id, uid, payload.ready).await?;
    Ok(Json(player))
}

#[utoipa::path(
    post,
    path = "/api/matches/{id}/answers",
    tag = "match",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerRow),
        (status = 409, description = "Not in the answering phase or already scored")
    )
)]
/// Submit (or overwrite) the caller's answer for the current question.
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Identity(uid): Identity,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<AnswerRow>, AppError> {
    let answer =
        match_service::submit_answer(state.store(), id, uid, payload.choice_index).await?;
    Ok(Json(answer))
}

#[utoipa::path(
    get,
    path = "/api/matches/{id}/solutions/{index}",
    tag = "match",
    params(
        ("id" = Uuid, Path, description = "Match identifier"),
        ("index" = usize, Path, description = "Question index")
    ),
    responses(
        (status = 200, description = "Solution for a finished round", body = SolutionView),
        (status = 409, description = "Round has not ended yet")
    )
)]
/// Fetch the solution for a question once its round has ended.
pub async fn get_solution(
    State(state): State<SharedState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SolutionView>, AppError> {
    let solution = match_service::fetch_solution(state.store(), id, index).await?;
    Ok(Json(solution))
}
