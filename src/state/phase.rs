//! Transition rules and timer derivation for the match lifecycle.
//!
//! The lifecycle is `lobby -> question_reveal -> answering -> scoring ->
//! round_end -> (question_reveal | finished)`, with `round_end ->
//! question_reveal` the only repeatable edge. The table below is the guard for
//! every conditional transition write, which is what makes duplicate triggers
//! from racing host timers and listeners safe: whichever write lands second
//! finds the predecessor gone and affects zero rows.

use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;

use crate::dao::models::MatchStatus;

/// Error returned when a requested transition has no edge in the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: cannot enter {to} from {from}")]
pub struct InvalidTransition {
    /// Status the match was observed in.
    pub from: MatchStatus,
    /// Status the caller asked to enter.
    pub to: MatchStatus,
}

/// Statuses from which a match may legally enter `to`.
pub fn expected_predecessors(to: MatchStatus) -> &'static [MatchStatus] {
    match to {
        MatchStatus::Lobby => &[],
        MatchStatus::QuestionReveal => &[MatchStatus::Lobby, MatchStatus::RoundEnd],
        MatchStatus::Answering => &[MatchStatus::QuestionReveal],
        MatchStatus::Scoring => &[MatchStatus::Answering],
        MatchStatus::RoundEnd => &[MatchStatus::Scoring],
        MatchStatus::Finished => &[MatchStatus::RoundEnd],
    }
}

/// Validate a single transition edge.
pub fn check_transition(from: MatchStatus, to: MatchStatus) -> Result<(), InvalidTransition> {
    if expected_predecessors(to).contains(&from) {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

/// Whole seconds left in a phase that allows `allowed_seconds`, measured from
/// the authoritative `phase_start` rather than any client-local countdown.
///
/// A client subscribing after the deadline computes zero, never a negative or
/// stale value; a `phase_start` in the future (clock skew) is treated as "just
/// started".
pub fn remaining_seconds(
    phase_start: OffsetDateTime,
    allowed_seconds: u64,
    now: OffsetDateTime,
) -> u64 {
    let elapsed = (now - phase_start).whole_seconds().max(0) as u64;
    allowed_seconds.saturating_sub(elapsed)
}

/// [`remaining_seconds`] as a [`Duration`] suitable for a sleep, with
/// sub-second precision so a timer does not fire up to a second early.
pub fn remaining_duration(
    phase_start: OffsetDateTime,
    allowed_seconds: u64,
    now: OffsetDateTime,
) -> Duration {
    let deadline = phase_start + time::Duration::seconds(allowed_seconds as i64);
    let left = deadline - now;
    if left.is_positive() {
        Duration::from_secs_f64(left.as_seconds_f64())
    } else {
        Duration::ZERO
    }
}
