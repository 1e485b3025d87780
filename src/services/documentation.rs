use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Duel Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::sign_in_anonymously,
        crate::routes::matches::create_match,
        crate::routes::matches::get_match,
        crate::routes::matches::join_match,
        crate::routes::matches::set_ready,
        crate::routes::matches::submit_answer,
        crate::routes::matches::get_solution,
        crate::routes::phase::start_phase,
        crate::routes::phase::score_round,
        crate::routes::events::match_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::match_dto::CreateMatchRequest,
            crate::dto::match_dto::JoinMatchRequest,
            crate::dto::match_dto::ReadyRequest,
            crate::dto::match_dto::SubmitAnswerRequest,
            crate::dto::match_dto::StartPhaseRequest,
            crate::dto::match_dto::ScoreRoundRequest,
            crate::dto::match_dto::ScoreRoundResponse,
            crate::dto::match_dto::ScoreUpdateDto,
            crate::dto::match_dto::MatchView,
            crate::dto::match_dto::SolutionView,
            crate::dto::match_dto::IdentityResponse,
            crate::dto::quiz::QuizInput,
            crate::dto::quiz::QuestionInput,
            crate::dto::sse::Handshake,
            crate::dao::models::MatchStatus,
            crate::dao::models::MatchRow,
            crate::dao::models::PlayerRow,
            crate::dao::models::AnswerRow,
            crate::dao::models::Quiz,
            crate::dao::models::QuizQuestion,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Anonymous identity issuance"),
        (name = "match", description = "Match lifecycle operations"),
        (name = "phase", description = "Host-only phase and scoring operations"),
        (name = "sse", description = "Per-match server-sent event streams"),
    )
)]
pub struct ApiDoc;
