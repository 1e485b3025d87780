//! Request and response payloads for the match RPC surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{AnswerRow, MatchRow, MatchStatus, PlayerRow},
    dto::quiz::QuizInput,
    services::scoring::ScoreUpdate,
};

/// Payload used to create a fresh match from a quiz document.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMatchRequest {
    /// The quiz to play, answer keys included.
    pub quiz: QuizInput,
    /// Display name of the creating player.
    pub host_name: String,
    /// Answering-phase duration (5-60 s); defaults when omitted.
    #[serde(default)]
    pub timer_seconds: Option<u32>,
    /// Whether the match should be publicly listed.
    #[serde(default)]
    pub is_public: bool,
}

impl Validate for CreateMatchRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(quiz_errors) = self.quiz.validate() {
            errors.merge_self("quiz", Err(quiz_errors));
        }

        if let Some(timer) = self.timer_seconds
            && !(crate::config::MIN_TIMER_SECONDS..=crate::config::MAX_TIMER_SECONDS)
                .contains(&timer)
        {
            let mut err = validator::ValidationError::new("timer_seconds_range");
            err.message = Some("timer must be between 5 and 60 seconds".into());
            errors.add("timer_seconds", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to join an existing match as the second player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinMatchRequest {
    /// Display name of the joining player.
    #[validate(length(min = 1, message = "player name must not be empty"))]
    pub name: String,
}

/// Payload flipping the caller's ready flag.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadyRequest {
    /// New readiness value.
    pub ready: bool,
}

/// Payload submitting an answer for the current question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    /// Index of the chosen option.
    pub choice_index: usize,
}

/// Payload for the phase-transition RPC, the single write path that advances
/// `status` / `current_question_index` / `phase_start`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartPhaseRequest {
    /// Status to enter.
    pub status: MatchStatus,
    /// Question index to switch to (question reveals only).
    #[serde(default)]
    pub question_index: Option<usize>,
}

/// Payload for the scoring RPC.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScoreRoundRequest {
    /// Question to score.
    pub question_index: usize,
}

/// Outcome of a scoring invocation. Lock contention and already-scored rounds
/// report success with `already_scored` set, never an error.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreRoundResponse {
    /// Always true when the RPC returns 200.
    pub success: bool,
    /// Set when this invocation skipped scoring because a concurrent or
    /// earlier pass already handled the round.
    pub already_scored: bool,
    /// Per-player results of the pass that actually scored.
    pub score_updates: Vec<ScoreUpdateDto>,
}

/// Per-player result of a scoring pass.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreUpdateDto {
    /// Player identity.
    pub uid: String,
    /// New cumulative score.
    pub score: i64,
    /// Points awarded this round.
    pub points: i64,
    /// Whether the player's submission matched the solution.
    pub correct: bool,
}

impl From<ScoreUpdate> for ScoreUpdateDto {
    fn from(update: ScoreUpdate) -> Self {
        Self {
            uid: update.uid,
            score: update.score,
            points: update.points,
            correct: update.correct,
        }
    }
}

/// Bulk snapshot of one match as served to a (re)connecting client: the match
/// row, all players, and the answers of the current question only.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchView {
    /// The match row (player-facing quiz, no answer keys).
    #[serde(rename = "match")]
    pub match_row: MatchRow,
    /// All joined players.
    pub players: Vec<PlayerRow>,
    /// Answers for the current question.
    pub answers: Vec<AnswerRow>,
}

/// Solution payload fetchable once a round has ended.
#[derive(Debug, Serialize, ToSchema)]
pub struct SolutionView {
    /// Question the solution answers.
    pub question_index: usize,
    /// Correct option text.
    pub correct_answer: String,
    /// Optional explanation.
    pub explanation: Option<String>,
}

/// Identity issued by the anonymous sign-in endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    /// Opaque, stable-for-the-session user id.
    pub id: String,
}
