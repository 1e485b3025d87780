//! Client-local view of one match, reconciled against the change feed.
//!
//! The snapshot is a small reducer over a tagged union of updates: optimistic
//! local patches (applied immediately, tagged with a request id) and remote
//! confirmed events (which always win on conflict). Applying the same remote
//! event twice yields the same state as applying it once, so the echo of an
//! optimistic write needs no special casing beyond retiring its request id.

use uuid::Uuid;

use crate::dao::{
    match_store::events::{ChangeEvent, ChangedRow},
    models::{AnswerRow, MatchRow, MatchStatus, PlayerRow},
};

/// A local mutation applied before its store write has been confirmed.
#[derive(Debug, Clone)]
pub enum OptimisticPatch {
    /// Replace the match row (e.g. the host stopping the timer early).
    Match(MatchRow),
    /// Upsert a player row (e.g. toggling the ready flag).
    Player(PlayerRow),
    /// Upsert an answer row (selecting a choice).
    Answer(AnswerRow),
}

/// One update fed into the snapshot reducer.
#[derive(Debug, Clone)]
pub enum SnapshotUpdate {
    /// Authoritative row change from the store's feed.
    Remote(ChangeEvent),
    /// Local optimistic patch awaiting its echo.
    Optimistic {
        /// Request id used to recognise the patch's own echo.
        request_id: Uuid,
        /// The mutation to apply locally.
        patch: OptimisticPatch,
    },
}

/// Identifies which row a patch or event touches.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowKey {
    Match,
    Player(String),
    Answer(String, usize),
}

impl RowKey {
    fn of_row(row: &ChangedRow) -> Self {
        match row {
            ChangedRow::Match(_) => RowKey::Match,
            ChangedRow::Player(p) => RowKey::Player(p.uid.clone()),
            ChangedRow::Answer(a) => RowKey::Answer(a.uid.clone(), a.question_index),
        }
    }

    fn of_patch(patch: &OptimisticPatch) -> Self {
        match patch {
            OptimisticPatch::Match(_) => RowKey::Match,
            OptimisticPatch::Player(p) => RowKey::Player(p.uid.clone()),
            OptimisticPatch::Answer(a) => RowKey::Answer(a.uid.clone(), a.question_index),
        }
    }
}

/// Local snapshot of {match, players, current-question answers}.
#[derive(Debug, Clone, Default)]
pub struct MatchSnapshot {
    /// The match row, absent until the first fetch or event lands.
    pub match_row: Option<MatchRow>,
    /// Player rows, upserted by uid.
    pub players: Vec<PlayerRow>,
    /// Answer rows for the currently displayed question only.
    pub answers: Vec<AnswerRow>,
    pending: Vec<(Uuid, RowKey)>,
}

impl MatchSnapshot {
    /// Replace the whole snapshot from a bulk fetch (connect or reconnect).
    /// Pending optimistic requests are dropped; the fetch is authoritative.
    pub fn replace(
        &mut self,
        match_row: MatchRow,
        players: Vec<PlayerRow>,
        answers: Vec<AnswerRow>,
    ) {
        let index = match_row.current_question_index;
        self.match_row = Some(match_row);
        self.players = players;
        self.answers = answers;
        self.answers.retain(|a| a.question_index == index);
        self.pending.clear();
    }

    /// Apply one update to the snapshot.
    pub fn apply(&mut self, update: SnapshotUpdate) {
        match update {
            SnapshotUpdate::Remote(event) => {
                self.retire(&RowKey::of_row(&event.row));
                self.apply_row(event.row);
            }
            SnapshotUpdate::Optimistic { request_id, patch } => {
                self.pending.push((request_id, RowKey::of_patch(&patch)));
                self.apply_row(match patch {
                    OptimisticPatch::Match(row) => ChangedRow::Match(row),
                    OptimisticPatch::Player(row) => ChangedRow::Player(row),
                    OptimisticPatch::Answer(row) => ChangedRow::Answer(row),
                });
            }
        }
    }

    fn apply_row(&mut self, row: ChangedRow) {
        match row {
            ChangedRow::Match(incoming) => {
                // Entering a new reveal (or a new question index) invalidates
                // every locally held answer; late answer events for the
                // previous question are dropped by the index filter below.
                let fresh_question = self.match_row.as_ref().is_none_or(|old| {
                    old.current_question_index != incoming.current_question_index
                        || (incoming.status == MatchStatus::QuestionReveal
                            && old.status != MatchStatus::QuestionReveal)
                });
                if fresh_question {
                    self.answers.clear();
                }
                self.match_row = Some(incoming);
            }
            ChangedRow::Player(incoming) => {
                match self.players.iter_mut().find(|p| p.uid == incoming.uid) {
                    Some(existing) => *existing = incoming,
                    None => self.players.push(incoming),
                }
            }
            ChangedRow::Answer(incoming) => {
                if let Some(current) = self.current_question_index()
                    && incoming.question_index != current
                {
                    return;
                }
                match self
                    .answers
                    .iter_mut()
                    .find(|a| a.uid == incoming.uid && a.question_index == incoming.question_index)
                {
                    Some(existing) => *existing = incoming,
                    None => self.answers.push(incoming),
                }
            }
        }
    }

    fn retire(&mut self, key: &RowKey) {
        if let Some(position) = self.pending.iter().position(|(_, k)| k == key) {
            self.pending.remove(position);
        }
    }

    /// Index of the question currently displayed, if the match is known.
    pub fn current_question_index(&self) -> Option<usize> {
        self.match_row.as_ref().map(|m| m.current_question_index)
    }

    /// Current match status, if the match is known.
    pub fn status(&self) -> Option<MatchStatus> {
        self.match_row.as_ref().map(|m| m.status)
    }

    /// Whether `uid` is the elected host of this match.
    pub fn is_host(&self, uid: &str) -> bool {
        self.match_row
            .as_ref()
            .is_some_and(|m| m.host_uid == uid)
    }

    /// The player row for `uid`, if joined.
    pub fn player(&self, uid: &str) -> Option<&PlayerRow> {
        self.players.iter().find(|p| p.uid == uid)
    }

    /// Whether `uid` holds an answer row for the current question.
    pub fn has_answered(&self, uid: &str) -> bool {
        self.answers.iter().any(|a| a.uid == uid)
    }

    /// Number of optimistic patches still awaiting their echo.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::Quiz;
    use time::OffsetDateTime;

    fn match_row(status: MatchStatus, index: usize) -> MatchRow {
        let now = OffsetDateTime::now_utc();
        MatchRow {
            id: Uuid::nil(),
            quiz_name: "Q".into(),
            quiz: Quiz {
                quiz_name: "Q".into(),
                questions: Vec::new(),
            },
            host_uid: "host".into(),
            status,
            current_question_index: index,
            phase_start: now,
            timer_seconds: 30,
            is_public: false,
            created_at: now,
        }
    }

    fn player(uid: &str, ready: bool) -> PlayerRow {
        PlayerRow {
            match_id: Uuid::nil(),
            uid: uid.into(),
            name: uid.into(),
            joined_at: OffsetDateTime::now_utc(),
            ready,
            answered: false,
            score: 0,
        }
    }

    fn answer(uid: &str, question_index: usize, text: &str) -> AnswerRow {
        AnswerRow {
            match_id: Uuid::nil(),
            uid: uid.into(),
            question_index,
            choice_index: 0,
            choice_text: text.into(),
            is_correct: None,
            points: None,
            submitted_at: OffsetDateTime::now_utc(),
        }
    }

    fn remote(row: ChangedRow) -> SnapshotUpdate {
        SnapshotUpdate::Remote(ChangeEvent::update(row))
    }

    #[test]
    fn players_upsert_by_uid() {
        let mut snapshot = MatchSnapshot::default();
        snapshot.apply(remote(ChangedRow::Player(player("a", false))));
        snapshot.apply(remote(ChangedRow::Player(player("a", true))));
        snapshot.apply(remote(ChangedRow::Player(player("b", false))));

        assert_eq!(snapshot.players.len(), 2);
        assert!(snapshot.player("a").unwrap().ready);
    }

    #[test]
    fn stale_question_answers_are_dropped() {
        let mut snapshot = MatchSnapshot::default();
        snapshot.apply(remote(ChangedRow::Match(match_row(MatchStatus::Answering, 1))));
        snapshot.apply(remote(ChangedRow::Answer(answer("a", 0, "late"))));
        snapshot.apply(remote(ChangedRow::Answer(answer("a", 1, "current"))));

        assert_eq!(snapshot.answers.len(), 1);
        assert_eq!(snapshot.answers[0].choice_text, "current");
    }

    #[test]
    fn new_reveal_clears_local_answers() {
        let mut snapshot = MatchSnapshot::default();
        snapshot.apply(remote(ChangedRow::Match(match_row(MatchStatus::Answering, 0))));
        snapshot.apply(remote(ChangedRow::Answer(answer("a", 0, "4"))));
        assert_eq!(snapshot.answers.len(), 1);

        snapshot.apply(remote(ChangedRow::Match(match_row(
            MatchStatus::QuestionReveal,
            1,
        ))));
        assert!(snapshot.answers.is_empty());
    }

    #[test]
    fn remote_reapplication_is_idempotent() {
        let mut snapshot = MatchSnapshot::default();
        let event = ChangeEvent::update(ChangedRow::Player(player("a", true)));
        snapshot.apply(SnapshotUpdate::Remote(event.clone()));
        let once = snapshot.clone();
        snapshot.apply(SnapshotUpdate::Remote(event));

        assert_eq!(snapshot.players.len(), once.players.len());
        assert_eq!(snapshot.players[0].ready, once.players[0].ready);
    }

    #[test]
    fn optimistic_patch_applies_immediately_and_echo_retires_it() {
        let mut snapshot = MatchSnapshot::default();
        snapshot.apply(remote(ChangedRow::Match(match_row(MatchStatus::Answering, 0))));

        snapshot.apply(SnapshotUpdate::Optimistic {
            request_id: Uuid::new_v4(),
            patch: OptimisticPatch::Answer(answer("a", 0, "4")),
        });
        assert!(snapshot.has_answered("a"));
        assert_eq!(snapshot.pending_requests(), 1);

        // The authoritative echo of the same write.
        snapshot.apply(remote(ChangedRow::Answer(answer("a", 0, "4"))));
        assert_eq!(snapshot.pending_requests(), 0);
        assert_eq!(snapshot.answers.len(), 1);
    }

    #[test]
    fn remote_wins_over_optimistic_state() {
        let mut snapshot = MatchSnapshot::default();
        snapshot.apply(SnapshotUpdate::Optimistic {
            request_id: Uuid::new_v4(),
            patch: OptimisticPatch::Player(player("a", true)),
        });

        // The store rejected or rewrote the toggle; the remote row wins.
        snapshot.apply(remote(ChangedRow::Player(player("a", false))));
        assert!(!snapshot.player("a").unwrap().ready);
        assert_eq!(snapshot.pending_requests(), 0);
    }

    #[test]
    fn bulk_replace_filters_foreign_answers() {
        let mut snapshot = MatchSnapshot::default();
        snapshot.replace(
            match_row(MatchStatus::Answering, 2),
            vec![player("a", false)],
            vec![answer("a", 1, "old"), answer("a", 2, "new")],
        );
        assert_eq!(snapshot.answers.len(), 1);
        assert_eq!(snapshot.answers[0].question_index, 2);
    }
}
