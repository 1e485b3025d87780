//! The host-elected driver loop.
//!
//! Exactly one player per match (the creator) drives phase transitions: it
//! watches the live snapshot, arms timers from the authoritative
//! `phase_start`, and advances the match when a timer expires or a presence
//! predicate short-circuits it. Every write it issues is conditional, so a
//! restarted or duplicated driver converges instead of double-advancing.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{match_store::MatchStore, models::MatchStatus},
    error::ServiceError,
    services::{
        identity::UserId,
        match_service,
        scoring::{self, ScoreOutcome},
    },
    state::{
        phase::remaining_duration,
        presence::{all_answered, all_ready},
        snapshot::MatchSnapshot,
    },
};

/// Pause before retrying after a failed transition or scoring pass.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Drives one match through its lifecycle on behalf of the host player.
pub struct HostDriver {
    store: Arc<dyn MatchStore>,
    config: AppConfig,
    match_id: Uuid,
    uid: UserId,
    snapshot: watch::Receiver<MatchSnapshot>,
}

impl HostDriver {
    /// Create a driver reading match state from `snapshot` (a sync client's
    /// watch channel) and acting as `uid`.
    pub fn new(
        store: Arc<dyn MatchStore>,
        config: AppConfig,
        match_id: Uuid,
        uid: UserId,
        snapshot: watch::Receiver<MatchSnapshot>,
    ) -> Self {
        Self {
            store,
            config,
            match_id,
            uid,
            snapshot,
        }
    }

    /// Run until the match finishes or the snapshot channel closes.
    ///
    /// Returns immediately when `uid` turns out not to be the host; driving is
    /// the host's job alone.
    pub async fn run(mut self) -> Result<(), ServiceError> {
        loop {
            let directive = {
                let snapshot = self.snapshot.borrow_and_update().clone();
                self.next_step(&snapshot)
            };

            match directive {
                Step::Done => {
                    info!(match_id = %self.match_id, "match finished; driver stopping");
                    return Ok(());
                }
                Step::NotHost => {
                    debug!(match_id = %self.match_id, uid = %self.uid, "not the host; driver stopping");
                    return Ok(());
                }
                Step::Wait => {
                    if self.snapshot.changed().await.is_err() {
                        return Ok(());
                    }
                }
                Step::WaitWithDeadline(deadline) => {
                    tokio::select! {
                        _ = sleep(deadline) => {}
                        changed = self.snapshot.changed() => {
                            if changed.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
                Step::StartPhase(to, question_index) => {
                    self.try_start_phase(to, question_index).await;
                    self.settle().await;
                }
                Step::FinishRound(question_index) => {
                    self.finish_round(question_index).await;
                    self.settle().await;
                }
            }
        }
    }

    /// Decide the next action from the current snapshot. Pure, so the
    /// decision table is testable without timers.
    fn next_step(&self, snapshot: &MatchSnapshot) -> Step {
        let Some(match_row) = snapshot.match_row.as_ref() else {
            return Step::Wait;
        };
        if match_row.host_uid != self.uid {
            return Step::NotHost;
        }

        let now = time::OffsetDateTime::now_utc();
        match match_row.status {
            MatchStatus::Lobby => {
                if all_ready(&snapshot.players) {
                    Step::StartPhase(MatchStatus::QuestionReveal, Some(0))
                } else {
                    Step::Wait
                }
            }
            MatchStatus::QuestionReveal => {
                let left =
                    remaining_duration(match_row.phase_start, self.config.reveal_seconds, now);
                if left.is_zero() {
                    Step::StartPhase(MatchStatus::Answering, None)
                } else {
                    Step::WaitWithDeadline(left)
                }
            }
            MatchStatus::Answering => {
                if all_answered(&snapshot.players) {
                    return Step::FinishRound(match_row.current_question_index);
                }
                let left = remaining_duration(
                    match_row.phase_start,
                    u64::from(match_row.timer_seconds),
                    now,
                );
                if left.is_zero() {
                    Step::FinishRound(match_row.current_question_index)
                } else {
                    Step::WaitWithDeadline(left)
                }
            }
            // Another pass holds the lock (or left it behind after a crash).
            // Re-running the scoring path is safe: it either waits out the
            // lease or skips as already scored, then unblocks the round.
            MatchStatus::Scoring => Step::FinishRound(match_row.current_question_index),
            MatchStatus::RoundEnd => {
                if !all_ready(&snapshot.players) {
                    return Step::Wait;
                }
                let next = match_row.current_question_index + 1;
                if next >= match_row.question_count() {
                    Step::StartPhase(MatchStatus::Finished, None)
                } else {
                    Step::StartPhase(MatchStatus::QuestionReveal, Some(next))
                }
            }
            MatchStatus::Finished => Step::Done,
        }
    }

    /// Let the echo of the action reach the snapshot before re-deciding, so
    /// the loop does not re-issue a write it just made. Bounded, because the
    /// echo may have arrived before we started waiting.
    async fn settle(&mut self) {
        let _ = tokio::time::timeout(RETRY_BACKOFF, self.snapshot.changed()).await;
    }

    /// Issue one conditional transition; contention is a no-op, errors back
    /// off so the loop does not spin against an unavailable store.
    async fn try_start_phase(&self, to: MatchStatus, question_index: Option<usize>) {
        match match_service::start_phase(&self.store, self.match_id, to, question_index).await {
            Ok(_) => {}
            Err(err) => {
                warn!(match_id = %self.match_id, to = %to, error = %err, "transition failed");
                sleep(RETRY_BACKOFF).await;
            }
        }
    }

    /// Score the round, then reveal its results. Both halves tolerate a
    /// concurrent driver: the scoring lock admits one pass, and the
    /// `scoring -> round_end` write admits one winner.
    async fn finish_round(&self, question_index: usize) {
        match scoring::score_round(&self.store, &self.config, self.match_id, question_index).await
        {
            Ok(ScoreOutcome::Scored(updates)) => {
                debug!(
                    match_id = %self.match_id,
                    question_index,
                    players = updates.len(),
                    "round scored"
                );
            }
            Ok(ScoreOutcome::AlreadyScored) => {}
            Err(err) => {
                // The pass rolled the match back to answering; retry after a
                // pause rather than hammering the store.
                warn!(match_id = %self.match_id, question_index, error = %err, "scoring failed");
                sleep(RETRY_BACKOFF).await;
                return;
            }
        }

        match match_service::start_phase(&self.store, self.match_id, MatchStatus::RoundEnd, None)
            .await
        {
            Ok(_) => {}
            Err(err) => {
                warn!(match_id = %self.match_id, error = %err, "round end transition failed");
                sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

/// One decision of the driver loop.
#[derive(Debug)]
enum Step {
    Wait,
    WaitWithDeadline(Duration),
    StartPhase(MatchStatus, Option<usize>),
    FinishRound(usize),
    NotHost,
    Done,
}
