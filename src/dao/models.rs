//! Row types persisted by the record store.
//!
//! The quiz payload stored on a match row is the *player-facing* projection:
//! correct answers and explanations never appear here. They live in the
//! separate solutions table and are only handed out once a round has ended.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Maximum number of players allowed in a match.
pub const MATCH_CAPACITY: usize = 2;

/// Lifecycle phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Waiting for both players to join and declare themselves ready.
    Lobby,
    /// The current question is being shown; answering is not yet open.
    QuestionReveal,
    /// Players may submit answers until the timer expires or everyone answered.
    Answering,
    /// Transient state held while exactly one scoring pass runs.
    Scoring,
    /// Round results are visible; players flag ready for the next question.
    RoundEnd,
    /// Terminal state once the last round has been played.
    Finished,
}

impl MatchStatus {
    /// Stable snake_case name used in logs and wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Lobby => "lobby",
            MatchStatus::QuestionReveal => "question_reveal",
            MatchStatus::Answering => "answering",
            MatchStatus::Scoring => "scoring",
            MatchStatus::RoundEnd => "round_end",
            MatchStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Player-facing quiz content carried on the match row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Quiz {
    /// Display title of the quiz.
    pub quiz_name: String,
    /// Ordered question list, stripped of answer keys.
    pub questions: Vec<QuizQuestion>,
}

/// One question as visible to players before the round ends.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestion {
    /// Prompt text.
    pub question: String,
    /// Ordered option list the player picks from.
    pub options: Vec<String>,
}

/// One match row; exactly one exists per match id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchRow {
    /// Primary key of the match.
    pub id: Uuid,
    /// Copy of the quiz title for listings.
    pub quiz_name: String,
    /// Player-facing question set (no answer keys).
    pub quiz: Quiz,
    /// Identity that created the match and drives phase transitions.
    pub host_uid: String,
    /// Current lifecycle phase.
    pub status: MatchStatus,
    /// Index of the question currently being played (0-based, non-decreasing).
    pub current_question_index: usize,
    /// Wall-clock start of the current phase; every client derives its timers
    /// from this single value rather than a local countdown.
    #[serde(with = "time::serde::rfc3339")]
    pub phase_start: OffsetDateTime,
    /// Answering-phase duration in seconds, fixed at creation.
    pub timer_seconds: u32,
    /// Whether the match is listed publicly.
    pub is_public: bool,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MatchRow {
    /// Number of questions in the quiz.
    pub fn question_count(&self) -> usize {
        self.quiz.questions.len()
    }

    /// The question currently being played, if the index is in range.
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.quiz.questions.get(self.current_question_index)
    }
}

/// One player row per (match, uid).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerRow {
    /// Match this player belongs to.
    pub match_id: Uuid,
    /// Opaque identity issued by the identity provider.
    pub uid: String,
    /// Display name chosen when joining.
    pub name: String,
    /// Join timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
    /// Phase-dependent readiness: "ready to start" in the lobby, "ready for
    /// the next question" at round end.
    pub ready: bool,
    /// True once the player has submitted for the current question; reset at
    /// every question reveal.
    pub answered: bool,
    /// Cumulative score, never decreasing.
    pub score: i64,
}

/// One answer row per (match, uid, question_index).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerRow {
    /// Match this answer belongs to.
    pub match_id: Uuid,
    /// Identity of the submitting player.
    pub uid: String,
    /// Question the answer targets.
    pub question_index: usize,
    /// Index of the chosen option at submission time.
    pub choice_index: usize,
    /// Literal chosen option text; scoring compares this string, not the
    /// index, so option reordering cannot flip correctness.
    pub choice_text: String,
    /// Set by the scoring pass; `None` until the round is scored.
    pub is_correct: Option<bool>,
    /// Points awarded by the scoring pass; `None` until scored.
    pub points: Option<i64>,
    /// Submission timestamp used for time-decayed points.
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

/// One solution row per (match, question_index), kept out of the match row so
/// clients cannot receive answer keys before a round ends.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SolutionRow {
    /// Match this solution belongs to.
    pub match_id: Uuid,
    /// Question the solution answers.
    pub question_index: usize,
    /// Correct option text, compared verbatim against submissions.
    pub correct_answer: String,
    /// Optional explanation shown after the round.
    pub explanation: Option<String>,
}

/// Grading verdict recorded on an answer row by a scoring pass.
#[derive(Debug, Clone, Copy)]
pub struct GradedAnswer {
    /// Whether the submission matched the solution text.
    pub is_correct: bool,
    /// Points awarded for the submission.
    pub points: i64,
}

/// One player's share of a round's scoring outcome, committed atomically
/// with the rest of the round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    /// Player the outcome applies to.
    pub uid: String,
    /// New cumulative score.
    pub score: i64,
    /// Verdict for the player's answer; `None` when nothing was submitted.
    pub graded: Option<GradedAnswer>,
}

/// Partial update applied to a player row; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PlayerPatch {
    /// New readiness flag.
    pub ready: Option<bool>,
    /// New answered flag.
    pub answered: Option<bool>,
    /// New cumulative score.
    pub score: Option<i64>,
}

impl PlayerPatch {
    /// Patch that only flips the readiness flag.
    pub fn ready(ready: bool) -> Self {
        Self {
            ready: Some(ready),
            ..Self::default()
        }
    }

    /// Patch that only flips the answered flag.
    pub fn answered(answered: bool) -> Self {
        Self {
            answered: Some(answered),
            ..Self::default()
        }
    }

    /// Apply the patch to a row in place.
    pub fn apply(&self, row: &mut PlayerRow) {
        if let Some(ready) = self.ready {
            row.ready = ready;
        }
        if let Some(answered) = self.answered {
            row.answered = answered;
        }
        if let Some(score) = self.score {
            row.score = score;
        }
    }
}
