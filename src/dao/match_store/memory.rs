//! In-memory record store with a per-match broadcast change feed.
//!
//! Rows live in [`DashMap`] tables keyed by match id. Every mutation publishes
//! a [`ChangeEvent`] on the match's broadcast channel after the table guard is
//! released, so subscribers observe per-row updates in write order but get no
//! cross-row atomicity, matching the contract of [`MatchStore`].

use dashmap::DashMap;
use futures::{FutureExt, future};
use futures::future::BoxFuture;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{
        AnswerRow, MATCH_CAPACITY, MatchRow, MatchStatus, PlayerPatch, PlayerRow, RoundOutcome,
        SolutionRow,
    },
    storage::{StorageError, StorageResult},
};

use super::{
    MatchStore, TransitionGuard,
    events::{ChangeEvent, ChangedRow},
};

/// Capacity of each per-match change feed. A receiver that falls further
/// behind than this lags and must re-fetch.
const FEED_CAPACITY: usize = 64;

/// In-process [`MatchStore`] backend.
#[derive(Default)]
pub struct MemoryStore {
    matches: DashMap<Uuid, MatchRow>,
    players: DashMap<Uuid, Vec<PlayerRow>>,
    answers: DashMap<Uuid, Vec<AnswerRow>>,
    solutions: DashMap<Uuid, Vec<SolutionRow>>,
    feeds: DashMap<Uuid, broadcast::Sender<ChangeEvent>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn feed(&self, match_id: Uuid) -> broadcast::Sender<ChangeEvent> {
        self.feeds
            .entry(match_id)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    fn publish(&self, match_id: Uuid, event: ChangeEvent) {
        // Nobody listening is fine; the send error is expected then.
        let _ = self.feed(match_id).send(event);
    }

    fn do_insert_match(&self, row: MatchRow) -> StorageResult<MatchRow> {
        self.matches.insert(row.id, row.clone());
        self.publish(row.id, ChangeEvent::insert(ChangedRow::Match(row.clone())));
        Ok(row)
    }

    fn do_transition_match(
        &self,
        id: Uuid,
        guard: TransitionGuard,
        to: MatchStatus,
        question_index: Option<usize>,
        phase_start: Option<OffsetDateTime>,
    ) -> StorageResult<Option<MatchRow>> {
        let updated = {
            let Some(mut row) = self.matches.get_mut(&id) else {
                return Err(StorageError::MatchNotFound(id));
            };

            let holds = match guard {
                TransitionGuard::StatusIn(statuses) => statuses.contains(&row.status),
                TransitionGuard::StatusAndPhaseStart(status, stamp) => {
                    row.status == status && row.phase_start == stamp
                }
            };
            if !holds {
                return Ok(None);
            }

            row.status = to;
            if let Some(index) = question_index {
                row.current_question_index = index;
            }
            if let Some(stamp) = phase_start {
                row.phase_start = stamp;
            }
            row.clone()
        };

        self.publish(id, ChangeEvent::update(ChangedRow::Match(updated.clone())));
        Ok(Some(updated))
    }

    fn do_insert_player(&self, row: PlayerRow) -> StorageResult<PlayerRow> {
        if !self.matches.contains_key(&row.match_id) {
            return Err(StorageError::MatchNotFound(row.match_id));
        }

        {
            let mut players = self.players.entry(row.match_id).or_default();
            if players.iter().any(|p| p.uid == row.uid) {
                return Err(StorageError::AlreadyJoined {
                    match_id: row.match_id,
                    uid: row.uid,
                });
            }
            if players.len() >= MATCH_CAPACITY {
                return Err(StorageError::MatchFull(row.match_id));
            }
            players.push(row.clone());
        }

        self.publish(
            row.match_id,
            ChangeEvent::insert(ChangedRow::Player(row.clone())),
        );
        Ok(row)
    }

    fn do_update_player(
        &self,
        match_id: Uuid,
        uid: &str,
        patch: PlayerPatch,
    ) -> StorageResult<Option<PlayerRow>> {
        let updated = {
            let Some(mut players) = self.players.get_mut(&match_id) else {
                return Ok(None);
            };
            let Some(row) = players.iter_mut().find(|p| p.uid == uid) else {
                return Ok(None);
            };
            patch.apply(row);
            row.clone()
        };

        self.publish(
            match_id,
            ChangeEvent::update(ChangedRow::Player(updated.clone())),
        );
        Ok(Some(updated))
    }

    fn do_upsert_answer(&self, row: AnswerRow) -> StorageResult<AnswerRow> {
        let kind = {
            let mut answers = self.answers.entry(row.match_id).or_default();
            match answers
                .iter_mut()
                .find(|a| a.uid == row.uid && a.question_index == row.question_index)
            {
                Some(existing) => {
                    *existing = row.clone();
                    ChangeEvent::update(ChangedRow::Answer(row.clone()))
                }
                None => {
                    answers.push(row.clone());
                    ChangeEvent::insert(ChangedRow::Answer(row.clone()))
                }
            }
        };

        self.publish(row.match_id, kind);
        Ok(row)
    }


    fn do_commit_round(
        &self,
        match_id: Uuid,
        question_index: usize,
        outcomes: Vec<RoundOutcome>,
    ) -> StorageResult<()> {
        // Both table guards are held across the whole batch, so readers see
        // either no outcome or the complete one.
        let mut events = Vec::with_capacity(outcomes.len() * 2);
        {
            let Some(mut players) = self.players.get_mut(&match_id) else {
                return Err(StorageError::MatchNotFound(match_id));
            };
            let mut answers = self.answers.entry(match_id).or_default();

            for outcome in outcomes {
                let Some(player) = players.iter_mut().find(|p| p.uid == outcome.uid) else {
                    continue;
                };
                player.score = outcome.score;
                player.ready = false;
                events.push(ChangeEvent::update(ChangedRow::Player(player.clone())));

                if let Some(graded) = outcome.graded
                    && let Some(answer) = answers
                        .iter_mut()
                        .find(|a| a.uid == outcome.uid && a.question_index == question_index)
                {
                    answer.is_correct = Some(graded.is_correct);
                    answer.points = Some(graded.points);
                    events.push(ChangeEvent::update(ChangedRow::Answer(answer.clone())));
                }
            }
        }

        for event in events {
            self.publish(match_id, event);
        }
        Ok(())
    }
}

impl MatchStore for MemoryStore {
    fn insert_match(&self, row: MatchRow) -> BoxFuture<'static, StorageResult<MatchRow>> {
        future::ready(self.do_insert_match(row)).boxed()
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRow>>> {
        future::ready(Ok(self.matches.get(&id).map(|row| row.clone()))).boxed()
    }

    fn transition_match(
        &self,
        id: Uuid,
        guard: TransitionGuard,
        to: MatchStatus,
        question_index: Option<usize>,
        phase_start: Option<OffsetDateTime>,
    ) -> BoxFuture<'static, StorageResult<Option<MatchRow>>> {
        future::ready(self.do_transition_match(id, guard, to, question_index, phase_start)).boxed()
    }

    fn insert_player(&self, row: PlayerRow) -> BoxFuture<'static, StorageResult<PlayerRow>> {
        future::ready(self.do_insert_player(row)).boxed()
    }

    fn list_players(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerRow>>> {
        let players = self
            .players
            .get(&match_id)
            .map(|rows| rows.clone())
            .unwrap_or_default();
        future::ready(Ok(players)).boxed()
    }

    fn update_player(
        &self,
        match_id: Uuid,
        uid: String,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerRow>>> {
        future::ready(self.do_update_player(match_id, &uid, patch)).boxed()
    }

    fn upsert_answer(&self, row: AnswerRow) -> BoxFuture<'static, StorageResult<AnswerRow>> {
        future::ready(self.do_upsert_answer(row)).boxed()
    }

    fn list_answers(
        &self,
        match_id: Uuid,
        question_index: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerRow>>> {
        let answers = self
            .answers
            .get(&match_id)
            .map(|rows| {
                rows.iter()
                    .filter(|a| a.question_index == question_index)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        future::ready(Ok(answers)).boxed()
    }

    fn commit_round(
        &self,
        match_id: Uuid,
        question_index: usize,
        outcomes: Vec<RoundOutcome>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        future::ready(self.do_commit_round(match_id, question_index, outcomes)).boxed()
    }

    fn insert_solutions(&self, rows: Vec<SolutionRow>) -> BoxFuture<'static, StorageResult<()>> {
        for row in rows {
            self.solutions.entry(row.match_id).or_default().push(row);
        }
        future::ready(Ok(())).boxed()
    }

    fn find_solution(
        &self,
        match_id: Uuid,
        question_index: usize,
    ) -> BoxFuture<'static, StorageResult<Option<SolutionRow>>> {
        let solution = self.solutions.get(&match_id).and_then(|rows| {
            rows.iter()
                .find(|s| s.question_index == question_index)
                .cloned()
        });
        future::ready(Ok(solution)).boxed()
    }

    fn subscribe(&self, match_id: Uuid) -> broadcast::Receiver<ChangeEvent> {
        self.feed(match_id).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::match_store::events::ChangeKind;
    use crate::dao::models::Quiz;

    fn sample_match() -> MatchRow {
        let now = OffsetDateTime::now_utc();
        MatchRow {
            id: Uuid::new_v4(),
            quiz_name: "Q".into(),
            quiz: Quiz {
                quiz_name: "Q".into(),
                questions: Vec::new(),
            },
            host_uid: "host".into(),
            status: MatchStatus::Lobby,
            current_question_index: 0,
            phase_start: now,
            timer_seconds: 30,
            is_public: false,
            created_at: now,
        }
    }

    fn sample_player(match_id: Uuid, uid: &str) -> PlayerRow {
        PlayerRow {
            match_id,
            uid: uid.into(),
            name: uid.into(),
            joined_at: OffsetDateTime::now_utc(),
            ready: false,
            answered: false,
            score: 0,
        }
    }

    fn sample_answer(match_id: Uuid, uid: &str, choice: usize, text: &str) -> AnswerRow {
        AnswerRow {
            match_id,
            uid: uid.into(),
            question_index: 0,
            choice_index: choice,
            choice_text: text.into(),
            is_correct: None,
            points: None,
            submitted_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn conditional_transition_is_exclusive() {
        let store = MemoryStore::new();
        let row = store.do_insert_match(sample_match()).unwrap();

        let first = store
            .transition_match(
                row.id,
                TransitionGuard::StatusIn(&[MatchStatus::Lobby]),
                MatchStatus::QuestionReveal,
                Some(0),
                Some(OffsetDateTime::now_utc()),
            )
            .await
            .unwrap();
        assert_eq!(first.unwrap().status, MatchStatus::QuestionReveal);

        // Same guard again: another writer already won, zero rows affected.
        let second = store
            .transition_match(
                row.id,
                TransitionGuard::StatusIn(&[MatchStatus::Lobby]),
                MatchStatus::QuestionReveal,
                Some(0),
                Some(OffsetDateTime::now_utc()),
            )
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn scoring_lock_keeps_phase_start() {
        let store = MemoryStore::new();
        let row = store.do_insert_match(sample_match()).unwrap();
        store
            .transition_match(
                row.id,
                TransitionGuard::StatusIn(&[MatchStatus::Lobby]),
                MatchStatus::Answering,
                None,
                Some(row.phase_start),
            )
            .await
            .unwrap();

        let locked = store
            .transition_match(
                row.id,
                TransitionGuard::StatusIn(&[MatchStatus::Answering]),
                MatchStatus::Scoring,
                None,
                None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locked.status, MatchStatus::Scoring);
        assert_eq!(locked.phase_start, row.phase_start);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let store = MemoryStore::new();
        let row = store.do_insert_match(sample_match()).unwrap();

        store.insert_player(sample_player(row.id, "a")).await.unwrap();
        store.insert_player(sample_player(row.id, "b")).await.unwrap();

        let err = store
            .insert_player(sample_player(row.id, "c"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MatchFull(id) if id == row.id));
        assert_eq!(store.list_players(row.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_join_is_rejected() {
        let store = MemoryStore::new();
        let row = store.do_insert_match(sample_match()).unwrap();

        store.insert_player(sample_player(row.id, "a")).await.unwrap();
        let err = store
            .insert_player(sample_player(row.id, "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyJoined { .. }));
    }

    #[tokio::test]
    async fn answer_upsert_replaces_by_key() {
        let store = MemoryStore::new();
        let row = store.do_insert_match(sample_match()).unwrap();

        store
            .upsert_answer(sample_answer(row.id, "a", 0, "3"))
            .await
            .unwrap();
        store
            .upsert_answer(sample_answer(row.id, "a", 1, "4"))
            .await
            .unwrap();

        let answers = store.list_answers(row.id, 0).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].choice_text, "4");
    }

    #[tokio::test]
    async fn commit_round_applies_the_whole_outcome() {
        use crate::dao::models::GradedAnswer;

        let store = MemoryStore::new();
        let row = store.do_insert_match(sample_match()).unwrap();
        for uid in ["a", "b"] {
            let mut player = sample_player(row.id, uid);
            player.ready = true;
            store.insert_player(player).await.unwrap();
        }
        store
            .upsert_answer(sample_answer(row.id, "a", 1, "4"))
            .await
            .unwrap();

        store
            .commit_round(
                row.id,
                0,
                vec![
                    RoundOutcome {
                        uid: "a".into(),
                        score: 28,
                        graded: Some(GradedAnswer {
                            is_correct: true,
                            points: 28,
                        }),
                    },
                    RoundOutcome {
                        uid: "b".into(),
                        score: 0,
                        graded: None,
                    },
                ],
            )
            .await
            .unwrap();

        let players = store.list_players(row.id).await.unwrap();
        assert!(players.iter().all(|p| !p.ready));
        assert_eq!(players.iter().find(|p| p.uid == "a").unwrap().score, 28);
        assert_eq!(players.iter().find(|p| p.uid == "b").unwrap().score, 0);

        let answers = store.list_answers(row.id, 0).await.unwrap();
        assert_eq!(answers[0].is_correct, Some(true));
        assert_eq!(answers[0].points, Some(28));
    }

    #[tokio::test]
    async fn mutations_reach_subscribers_in_order() {
        let store = MemoryStore::new();
        let row = sample_match();
        let mut feed = store.subscribe(row.id);

        store.do_insert_match(row.clone()).unwrap();
        store.insert_player(sample_player(row.id, "a")).await.unwrap();

        let first = feed.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Insert);
        assert!(matches!(first.row, ChangedRow::Match(_)));

        let second = feed.recv().await.unwrap();
        assert!(matches!(second.row, ChangedRow::Player(p) if p.uid == "a"));
    }
}
