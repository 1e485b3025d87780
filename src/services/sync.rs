//! Client-side synchronisation: keep a [`MatchSnapshot`] live against the
//! store's change feed, with optimistic local writes.
//!
//! Consumers observe the snapshot through a watch channel, so they always see
//! the latest state and never queue behind stale intermediate versions. The
//! feed itself has no replay; a lagged receiver falls back to a full refetch.

use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{AnswerRow, MatchStatus},
    },
    error::ServiceError,
    services::{identity::UserId, match_service},
    state::snapshot::{MatchSnapshot, OptimisticPatch, SnapshotUpdate},
};

/// One player's live connection to a match.
///
/// Clone freely; clones share the same snapshot channel, so one `run` loop
/// serves any number of handles.
#[derive(Clone)]
pub struct SyncClient {
    store: Arc<dyn MatchStore>,
    match_id: Uuid,
    uid: UserId,
    snapshot: watch::Sender<MatchSnapshot>,
}

impl SyncClient {
    /// Create a client for `uid` on `match_id`. The snapshot stays empty
    /// until [`run`](Self::run) performs its initial fetch.
    pub fn new(store: Arc<dyn MatchStore>, match_id: Uuid, uid: UserId) -> Self {
        let (snapshot, _) = watch::channel(MatchSnapshot::default());
        Self {
            store,
            match_id,
            uid,
            snapshot,
        }
    }

    /// The identity this client acts as.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Watch the live snapshot. `borrow()` is always the latest state.
    pub fn subscribe(&self) -> watch::Receiver<MatchSnapshot> {
        self.snapshot.subscribe()
    }

    /// Drive the snapshot until the store's feed closes.
    ///
    /// Subscribes before the initial fetch, so no event between the two is
    /// lost; reapplying an event already contained in the fetch is harmless
    /// because the reducer upserts by row key.
    pub async fn run(&self) -> Result<(), ServiceError> {
        let mut feed = self.store.subscribe(self.match_id);
        self.refetch().await?;

        loop {
            match feed.recv().await {
                Ok(event) => {
                    self.snapshot
                        .send_modify(|s| s.apply(SnapshotUpdate::Remote(event)));
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(
                        match_id = %self.match_id,
                        missed,
                        "change feed lagged; refetching snapshot"
                    );
                    self.refetch().await?;
                }
                Err(RecvError::Closed) => {
                    debug!(match_id = %self.match_id, "change feed closed");
                    return Ok(());
                }
            }
        }
    }

    /// Flag (or unflag) this player as ready, optimistically.
    pub async fn set_ready(&self, ready: bool) -> Result<(), ServiceError> {
        let optimistic = self.snapshot.borrow().player(&self.uid).cloned();
        if let Some(mut row) = optimistic {
            row.ready = ready;
            self.apply_optimistic(OptimisticPatch::Player(row));
        }

        match match_service::set_ready(&self.store, self.match_id, self.uid.clone(), ready).await {
            Ok(_) => Ok(()),
            Err(err) => self.roll_back(err).await,
        }
    }

    /// Invert this player's current ready flag.
    pub async fn toggle_ready(&self) -> Result<(), ServiceError> {
        let ready = self
            .snapshot
            .borrow()
            .player(&self.uid)
            .is_some_and(|p| p.ready);
        self.set_ready(!ready).await
    }

    /// Submit (or change) this player's answer for the current question,
    /// showing the selection locally before the write is confirmed.
    pub async fn submit_answer(&self, choice_index: usize) -> Result<(), ServiceError> {
        if let Some(row) = self.optimistic_answer(choice_index) {
            self.apply_optimistic(OptimisticPatch::Answer(row));
        }

        match match_service::submit_answer(
            &self.store,
            self.match_id,
            self.uid.clone(),
            choice_index,
        )
        .await
        {
            Ok(_) => Ok(()),
            Err(err) => self.roll_back(err).await,
        }
    }

    /// Replace the snapshot from a bulk fetch, dropping pending optimism.
    async fn refetch(&self) -> Result<(), ServiceError> {
        let view = match_service::match_view(&self.store, self.match_id).await?;
        self.snapshot
            .send_modify(|s| s.replace(view.match_row, view.players, view.answers));
        Ok(())
    }

    /// A rejected write leaves the optimistic patch dangling with no echo to
    /// retire it; refetch so the snapshot reflects the store again.
    async fn roll_back(&self, err: ServiceError) -> Result<(), ServiceError> {
        debug!(match_id = %self.match_id, error = %err, "write rejected; reverting snapshot");
        self.refetch().await?;
        Err(err)
    }

    fn apply_optimistic(&self, patch: OptimisticPatch) {
        self.snapshot.send_modify(|s| {
            s.apply(SnapshotUpdate::Optimistic {
                request_id: Uuid::new_v4(),
                patch,
            });
        });
    }

    /// Build the answer row the store write is expected to produce, if the
    /// snapshot holds enough state to predict it.
    fn optimistic_answer(&self, choice_index: usize) -> Option<AnswerRow> {
        let snapshot = self.snapshot.borrow();
        let match_row = snapshot.match_row.as_ref()?;
        if match_row.status != MatchStatus::Answering {
            return None;
        }
        let choice_text = match_row
            .current_question()?
            .options
            .get(choice_index)?
            .clone();
        Some(AnswerRow {
            match_id: self.match_id,
            uid: self.uid.clone(),
            question_index: match_row.current_question_index,
            choice_index,
            choice_text,
            is_correct: None,
            points: None,
            submitted_at: time::OffsetDateTime::now_utc(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DEFAULT_TIMER_SECONDS,
        dao::match_store::memory::MemoryStore,
        dto::{
            match_dto::CreateMatchRequest,
            quiz::{QuestionInput, QuizInput},
        },
    };

    fn store() -> Arc<dyn MatchStore> {
        Arc::new(MemoryStore::new())
    }

    async fn create(store: &Arc<dyn MatchStore>) -> Uuid {
        let request = CreateMatchRequest {
            quiz: QuizInput {
                quiz_name: "Q".into(),
                questions: vec![QuestionInput {
                    question: "2+2?".into(),
                    options: vec!["3".into(), "4".into(), "5".into()],
                    correct_answer: "4".into(),
                    explanation: None,
                }],
            },
            host_name: "Alice".into(),
            timer_seconds: Some(30),
            is_public: false,
        };
        match_service::create_match(store, request, "host".into(), DEFAULT_TIMER_SECONDS)
            .await
            .unwrap()
            .match_row
            .id
    }

    async fn running_client(
        store: &Arc<dyn MatchStore>,
        match_id: Uuid,
        uid: &str,
    ) -> (SyncClient, watch::Receiver<MatchSnapshot>) {
        let client = SyncClient::new(store.clone(), match_id, uid.into());
        let mut receiver = client.subscribe();
        let runner = client.clone();
        tokio::spawn(async move { runner.run().await });
        receiver
            .wait_for(|s| s.match_row.is_some())
            .await
            .unwrap();
        (client, receiver)
    }

    #[tokio::test]
    async fn initial_fetch_populates_the_snapshot() {
        let store = store();
        let match_id = create(&store).await;

        let (_, receiver) = running_client(&store, match_id, "host").await;
        let snapshot = receiver.borrow();
        assert_eq!(snapshot.status(), Some(MatchStatus::Lobby));
        assert_eq!(snapshot.players.len(), 1);
        assert!(snapshot.is_host("host"));
    }

    #[tokio::test]
    async fn remote_changes_reach_the_snapshot() {
        let store = store();
        let match_id = create(&store).await;
        let (_, mut receiver) = running_client(&store, match_id, "host").await;

        match_service::join_match(&store, match_id, "p2".into(), "Bob".into())
            .await
            .unwrap();

        receiver
            .wait_for(|s| s.players.len() == 2)
            .await
            .unwrap();
        assert!(receiver.borrow().player("p2").is_some());
    }

    #[tokio::test]
    async fn ready_toggle_is_visible_before_the_echo() {
        let store = store();
        let match_id = create(&store).await;
        let (client, mut receiver) = running_client(&store, match_id, "host").await;

        client.set_ready(true).await.unwrap();
        // The optimistic patch landed synchronously during the call.
        assert!(receiver.borrow().player("host").unwrap().ready);

        // The echo retires the pending request without flipping the flag.
        receiver
            .wait_for(|s| s.pending_requests() == 0)
            .await
            .unwrap();
        assert!(receiver.borrow().player("host").unwrap().ready);

        client.toggle_ready().await.unwrap();
        assert!(!receiver.borrow().player("host").unwrap().ready);
    }

    #[tokio::test]
    async fn rejected_answer_reverts_the_snapshot() {
        let store = store();
        let match_id = create(&store).await;
        let (client, receiver) = running_client(&store, match_id, "host").await;

        // The match is still in the lobby, so the write is rejected.
        let err = client.submit_answer(1).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let snapshot = receiver.borrow();
        assert!(!snapshot.has_answered("host"));
        assert_eq!(snapshot.pending_requests(), 0);
    }

    #[tokio::test]
    async fn answer_selection_shows_locally_during_answering() {
        let store = store();
        let match_id = create(&store).await;
        let (client, mut receiver) = running_client(&store, match_id, "host").await;

        match_service::start_phase(&store, match_id, MatchStatus::QuestionReveal, Some(0))
            .await
            .unwrap();
        match_service::start_phase(&store, match_id, MatchStatus::Answering, None)
            .await
            .unwrap();
        receiver
            .wait_for(|s| s.status() == Some(MatchStatus::Answering))
            .await
            .unwrap();

        client.submit_answer(1).await.unwrap();
        assert!(receiver.borrow().has_answered("host"));
        assert_eq!(receiver.borrow().answers[0].choice_text, "4");
    }
}
