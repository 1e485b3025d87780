//! The scoring engine: exactly-once scoring of one round.
//!
//! Mutual exclusion rests on a conditional status update used as a
//! distributed lock: only the invocation that flips `answering -> scoring`
//! proceeds; every other concurrent caller observes zero affected rows and
//! reports success-as-no-op. A second idempotence check (any answer already
//! graded) guards against a lock acquired after a crashed pass partially
//! completed its work.
//!
//! The lock transition deliberately keeps `phase_start` untouched: it is the
//! answering-phase timing baseline for time-decayed points, and doubling as
//! the lock timestamp bounds the lock's age at `phase_start + timer_seconds`.
//! A scoring status older than that plus the configured lease is considered
//! abandoned and may be reclaimed via a compare-and-swap on `phase_start`.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        match_store::{MatchStore, TransitionGuard},
        models::{
            AnswerRow, GradedAnswer, MatchRow, MatchStatus, PlayerRow, RoundOutcome, SolutionRow,
        },
    },
    error::ServiceError,
};

/// Per-player result of a completed scoring pass.
#[derive(Debug, Clone)]
pub struct ScoreUpdate {
    /// Player identity.
    pub uid: String,
    /// New cumulative score.
    pub score: i64,
    /// Points awarded this round (zero for incorrect or missing answers).
    pub points: i64,
    /// Whether the submission matched the solution text.
    pub correct: bool,
}

/// Outcome of a scoring invocation; both variants are success for the caller.
#[derive(Debug)]
pub enum ScoreOutcome {
    /// This invocation held the lock and applied the score updates.
    Scored(Vec<ScoreUpdate>),
    /// Another pass holds the lock or already scored the round; nothing was
    /// mutated. Never retried, never surfaced as an error.
    AlreadyScored,
}

/// Score one round of a match, exactly once per (match, question).
pub async fn score_round(
    store: &Arc<dyn MatchStore>,
    config: &AppConfig,
    match_id: Uuid,
    question_index: usize,
) -> Result<ScoreOutcome, ServiceError> {
    let Some(locked) = acquire_lock(store, config, match_id).await? else {
        debug!(match_id = %match_id, question_index, "scoring lock contended; skipping");
        return Ok(ScoreOutcome::AlreadyScored);
    };

    let answers = match store.list_answers(match_id, question_index).await {
        Ok(answers) => answers,
        Err(err) => return abort(store, match_id, err.into()).await,
    };

    // A graded answer means a previous pass got at least this far; skip all
    // mutation rather than risk awarding points twice.
    if answers.iter().any(|a| a.is_correct.is_some()) {
        debug!(match_id = %match_id, question_index, "round already scored; skipping");
        return Ok(ScoreOutcome::AlreadyScored);
    }

    let solution = match store.find_solution(match_id, question_index).await {
        Ok(Some(solution)) => solution,
        Ok(None) => {
            return abort(
                store,
                match_id,
                ServiceError::NotFound(format!("solution for question {question_index}")),
            )
            .await;
        }
        Err(err) => return abort(store, match_id, err.into()).await,
    };

    let players = match store.list_players(match_id).await {
        Ok(players) => players,
        Err(err) => return abort(store, match_id, err.into()).await,
    };

    match apply_scores(store, config, &locked, question_index, &players, &answers, &solution).await
    {
        Ok(updates) => {
            info!(match_id = %match_id, question_index, "scoring complete");
            Ok(ScoreOutcome::Scored(updates))
        }
        Err(err) => abort(store, match_id, err).await,
    }
}

/// Flip `answering -> scoring`, or reclaim a scoring lock whose lease has
/// expired. Returns the locked match row, or `None` when another pass holds
/// the lock.
async fn acquire_lock(
    store: &Arc<dyn MatchStore>,
    config: &AppConfig,
    match_id: Uuid,
) -> Result<Option<MatchRow>, ServiceError> {
    let locked = store
        .transition_match(
            match_id,
            TransitionGuard::StatusIn(&[MatchStatus::Answering]),
            MatchStatus::Scoring,
            None,
            // Keep phase_start: it is the timing baseline for points.
            None,
        )
        .await?;
    if locked.is_some() {
        return Ok(locked);
    }

    let Some(current) = store.find_match(match_id).await? else {
        return Err(ServiceError::NotFound(format!("match `{match_id}`")));
    };
    if current.status != MatchStatus::Scoring {
        return Ok(None);
    }

    let lease =
        Duration::seconds((u64::from(current.timer_seconds) + config.lock_lease_seconds) as i64);
    if OffsetDateTime::now_utc() - current.phase_start < lease {
        return Ok(None);
    }

    // The previous pass crashed without unlocking. Reclaim exclusively by
    // swapping phase_start; the timing baseline is the pre-swap value, which
    // we keep in hand via `current`.
    let reclaimed = store
        .transition_match(
            match_id,
            TransitionGuard::StatusAndPhaseStart(MatchStatus::Scoring, current.phase_start),
            MatchStatus::Scoring,
            None,
            Some(OffsetDateTime::now_utc()),
        )
        .await?;
    if reclaimed.is_some() {
        warn!(match_id = %match_id, "reclaimed an expired scoring lock");
        return Ok(Some(current));
    }
    Ok(None)
}

/// Compute every player's outcome, then commit the round as one batch so no
/// partially scored state is ever observable.
async fn apply_scores(
    store: &Arc<dyn MatchStore>,
    config: &AppConfig,
    locked: &MatchRow,
    question_index: usize,
    players: &[PlayerRow],
    answers: &[AnswerRow],
    solution: &SolutionRow,
) -> Result<Vec<ScoreUpdate>, ServiceError> {
    let mut outcomes = Vec::with_capacity(players.len());
    let mut updates = Vec::with_capacity(players.len());

    for player in players {
        let answer = answers.iter().find(|a| a.uid == player.uid);
        // Correctness by option text, never by index.
        let correct = answer.is_some_and(|a| a.choice_text == solution.correct_answer);
        let points = match answer {
            Some(a) if correct => {
                config
                    .scoring
                    .points(locked.phase_start, a.submitted_at, locked.timer_seconds)
            }
            // Incorrect or missing answers score zero, never negative.
            _ => 0,
        };
        let score = player.score + points;

        debug!(
            match_id = %locked.id,
            uid = %player.uid,
            correct,
            points,
            score,
            "player scored"
        );

        outcomes.push(RoundOutcome {
            uid: player.uid.clone(),
            score,
            graded: answer.map(|_| GradedAnswer {
                is_correct: correct,
                points,
            }),
        });
        updates.push(ScoreUpdate {
            uid: player.uid.clone(),
            score,
            points,
            correct,
        });
    }

    store.commit_round(locked.id, question_index, outcomes).await?;

    Ok(updates)
}

/// Compensating unlock after a failed pass: put the match back into
/// `answering` so the host's next trigger can retry, then surface the error.
async fn abort(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
    err: ServiceError,
) -> Result<ScoreOutcome, ServiceError> {
    warn!(match_id = %match_id, error = %err, "scoring pass failed; unlocking");
    match store
        .transition_match(
            match_id,
            TransitionGuard::StatusIn(&[MatchStatus::Scoring]),
            MatchStatus::Answering,
            None,
            None,
        )
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => warn!(match_id = %match_id, "lock already released elsewhere"),
        Err(unlock_err) => {
            warn!(match_id = %match_id, error = %unlock_err, "failed to release scoring lock");
        }
    }
    Err(err)
}
