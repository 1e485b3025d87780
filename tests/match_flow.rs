//! End-to-end match flow exercised through the public library surface: two
//! sync clients and a host driver sharing one in-memory store, the same way
//! the HTTP layer composes them.

use std::sync::Arc;

use quiz_duel_back::{
    config::{AppConfig, DEFAULT_TIMER_SECONDS},
    dao::{
        match_store::{MatchStore, memory::MemoryStore},
        models::MatchStatus,
    },
    dto::{
        match_dto::CreateMatchRequest,
        quiz::{QuestionInput, QuizInput},
    },
    error::ServiceError,
    services::{host_driver::HostDriver, match_service, sync::SyncClient},
};
use uuid::Uuid;

fn arithmetic_quiz() -> QuizInput {
    QuizInput {
        quiz_name: "Arithmetic".into(),
        questions: vec![QuestionInput {
            question: "2+2?".into(),
            options: vec!["3".into(), "4".into(), "5".into()],
            correct_answer: "4".into(),
            explanation: Some("basic addition".into()),
        }],
    }
}

async fn create_match(store: &Arc<dyn MatchStore>) -> Uuid {
    let request = CreateMatchRequest {
        quiz: arithmetic_quiz(),
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

async fn connect(store: &Arc<dyn MatchStore>, match_id: Uuid, uid: &str) -> SyncClient {
    let client = SyncClient::new(store.clone(), match_id, uid.into());
    let mut receiver = client.subscribe();
    let runner = client.clone();
    tokio::spawn(async move { runner.run().await });
    receiver.wait_for(|s| s.match_row.is_some()).await.unwrap();
    client
}

#[tokio::test(start_paused = true)]
async fn two_players_play_a_match_to_completion() {
    let store: Arc<dyn MatchStore> = Arc::new(MemoryStore::new());
    let match_id = create_match(&store).await;
    match_service::join_match(&store, match_id, "p2".into(), "Bob".into())
        .await
        .unwrap();

    let host = connect(&store, match_id, "host").await;
    let guest = connect(&store, match_id, "p2").await;
    let mut guest_view = guest.subscribe();

    let driver = HostDriver::new(
        store.clone(),
        AppConfig::default(),
        match_id,
        "host".into(),
        host.subscribe(),
    );
    let driver_task = tokio::spawn(async move { driver.run().await });

    // Lobby: both ready up, the driver starts question zero.
    host.set_ready(true).await.unwrap();
    guest.set_ready(true).await.unwrap();
    guest_view
        .wait_for(|s| s.status() == Some(MatchStatus::QuestionReveal))
        .await
        .unwrap();
    assert_eq!(guest_view.borrow().current_question_index(), Some(0));

    // The reveal times out into answering without any client action.
    guest_view
        .wait_for(|s| s.status() == Some(MatchStatus::Answering))
        .await
        .unwrap();

    // Alice answers "4" (correct), Bob answers "3"; everyone having answered
    // short-circuits the thirty-second timer.
    host.submit_answer(1).await.unwrap();
    guest.submit_answer(0).await.unwrap();
    guest_view
        .wait_for(|s| s.status() == Some(MatchStatus::RoundEnd))
        .await
        .unwrap();

    {
        let snapshot = guest_view.borrow();
        let alice = snapshot.player("host").unwrap();
        let bob = snapshot.player("p2").unwrap();
        assert!(alice.score > 0);
        assert!(alice.score <= i64::from(DEFAULT_TIMER_SECONDS));
        assert_eq!(bob.score, 0);

        let alice_answer = snapshot.answers.iter().find(|a| a.uid == "host").unwrap();
        let bob_answer = snapshot.answers.iter().find(|a| a.uid == "p2").unwrap();
        assert_eq!(alice_answer.is_correct, Some(true));
        assert_eq!(bob_answer.is_correct, Some(false));
    }

    // Solutions are only readable now that the round has ended.
    let solution = match_service::fetch_solution(&store, match_id, 0)
        .await
        .unwrap();
    assert_eq!(solution.correct_answer, "4");
    assert_eq!(solution.explanation.as_deref(), Some("basic addition"));

    // Last question: readying up at round end finishes the match.
    host.set_ready(true).await.unwrap();
    guest.set_ready(true).await.unwrap();
    guest_view
        .wait_for(|s| s.status() == Some(MatchStatus::Finished))
        .await
        .unwrap();

    driver_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn a_third_player_cannot_join() {
    let store: Arc<dyn MatchStore> = Arc::new(MemoryStore::new());
    let match_id = create_match(&store).await;

    match_service::join_match(&store, match_id, "p2".into(), "Bob".into())
        .await
        .unwrap();
    let err = match_service::join_match(&store, match_id, "p3".into(), "Carol".into())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::MatchFull));

    // The refused join left no trace behind.
    assert_eq!(store.list_players(match_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn late_subscriber_catches_up_from_the_bulk_fetch() {
    let store: Arc<dyn MatchStore> = Arc::new(MemoryStore::new());
    let match_id = create_match(&store).await;
    match_service::join_match(&store, match_id, "p2".into(), "Bob".into())
        .await
        .unwrap();
    match_service::start_phase(&store, match_id, MatchStatus::QuestionReveal, Some(0))
        .await
        .unwrap();
    match_service::start_phase(&store, match_id, MatchStatus::Answering, None)
        .await
        .unwrap();
    match_service::submit_answer(&store, match_id, "host".into(), 1)
        .await
        .unwrap();

    // Everything above happened before this client ever connected.
    let late = connect(&store, match_id, "p2").await;
    let view = late.subscribe();
    let snapshot = view.borrow();
    assert_eq!(snapshot.status(), Some(MatchStatus::Answering));
    assert_eq!(snapshot.players.len(), 2);
    assert!(snapshot.has_answered("host"));
    assert!(!snapshot.has_answered("p2"));
}
