//! Record-store abstraction for match, player, answer, and solution rows.
//!
//! The store guarantees causally consistent ordering per row but no cross-row
//! atomicity: a pair of writes (answer upsert plus answered-flag patch) can be
//! observed by another client in either order. Consumers must tolerate that
//! window; see the presence tracker and snapshot reducer.

pub mod events;
pub mod memory;

use futures::future::BoxFuture;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{AnswerRow, MatchRow, MatchStatus, PlayerPatch, PlayerRow, RoundOutcome, SolutionRow},
    storage::StorageResult,
};

use self::events::ChangeEvent;

/// Guard condition for a conditional match-row update.
///
/// The conditional update is the only mutual-exclusion primitive in the
/// system: exactly one concurrent writer observes the guard holding.
#[derive(Debug, Clone)]
pub enum TransitionGuard {
    /// Update only while the current status is one of the listed values.
    StatusIn(&'static [MatchStatus]),
    /// Compare-and-swap on (status, phase_start); used to reclaim a scoring
    /// lock whose lease has expired.
    StatusAndPhaseStart(MatchStatus, OffsetDateTime),
}

/// Abstraction over the durable record store backing a match.
///
/// Only the in-memory backend ships with this crate; a database-backed
/// implementation plugs in behind the same trait.
pub trait MatchStore: Send + Sync {
    /// Persist a fresh match row.
    fn insert_match(&self, row: MatchRow) -> BoxFuture<'static, StorageResult<MatchRow>>;

    /// Point-read a match row.
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRow>>>;

    /// Conditionally advance a match's status, question index, and phase
    /// start. Returns the updated row when the guard matched, `None` when
    /// another writer won the race (zero affected rows).
    ///
    /// `question_index: None` keeps the current index; `phase_start: None`
    /// keeps the current timestamp (used by the scoring lock so the answering
    /// timing baseline survives the transition).
    fn transition_match(
        &self,
        id: Uuid,
        guard: TransitionGuard,
        to: MatchStatus,
        question_index: Option<usize>,
        phase_start: Option<OffsetDateTime>,
    ) -> BoxFuture<'static, StorageResult<Option<MatchRow>>>;

    /// Insert a player row, enforcing the two-player capacity and per-match
    /// uid uniqueness.
    fn insert_player(&self, row: PlayerRow) -> BoxFuture<'static, StorageResult<PlayerRow>>;

    /// All player rows of a match, in join order.
    fn list_players(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerRow>>>;

    /// Patch a player row; returns `None` when no such player exists.
    fn update_player(
        &self,
        match_id: Uuid,
        uid: String,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRow>>>;

    /// Insert or overwrite the answer keyed by (match, uid, question_index).
    /// Resubmission before scoring replaces the row, never duplicates it.
    fn upsert_answer(&self, row: AnswerRow) -> BoxFuture<'static, StorageResult<AnswerRow>>;

    /// All answers submitted for one question of a match.
    fn list_answers(
        &self,
        match_id: Uuid,
        question_index: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerRow>>>;

    /// Commit a round's scoring outcome in one all-or-nothing batch: per
    /// player the new cumulative score, a ready reset, and the answer
    /// verdict when one was submitted. No partial mutation may become
    /// observable through reads; the change feed still carries one event per
    /// touched row.
    fn commit_round(
        &self,
        match_id: Uuid,
        question_index: usize,
        outcomes: Vec<RoundOutcome>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Persist the solution rows split off a quiz at match creation.
    fn insert_solutions(
        &self,
        rows: Vec<SolutionRow>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Point-read the solution for one question.
    fn find_solution(
        &self,
        match_id: Uuid,
        question_index: usize,
    ) -> BoxFuture<'static, StorageResult<Option<SolutionRow>>>;

    /// Subscribe to row-level change events scoped to one match. The feed has
    /// no replay: a receiver that lags must re-fetch the full snapshot.
    fn subscribe(&self, match_id: Uuid) -> broadcast::Receiver<ChangeEvent>;
}
