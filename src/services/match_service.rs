//! Match lifecycle operations: creation, joining, readiness, answer
//! submission, solution fetch, and the single phase-transition write path.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        match_store::{MatchStore, TransitionGuard},
        models::{AnswerRow, MatchRow, MatchStatus, PlayerPatch, PlayerRow},
    },
    dto::match_dto::{CreateMatchRequest, MatchView, SolutionView},
    error::ServiceError,
    services::identity::UserId,
    state::phase::expected_predecessors,
};

/// Create a match from a quiz document and join the creator as first player.
///
/// The stored match row carries only the player-facing quiz projection; the
/// answer keys are split into solution rows before anything is persisted.
pub async fn create_match(
    store: &Arc<dyn MatchStore>,
    request: CreateMatchRequest,
    host_uid: UserId,
    default_timer_seconds: u32,
) -> Result<MatchView, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(format!("invalid quiz: {err}")))?;

    let timer_seconds = request.timer_seconds.unwrap_or(default_timer_seconds);
    let now = OffsetDateTime::now_utc();
    let id = Uuid::new_v4();

    let row = MatchRow {
        id,
        quiz_name: request.quiz.quiz_name.clone(),
        quiz: request.quiz.view(),
        host_uid: host_uid.clone(),
        status: MatchStatus::Lobby,
        current_question_index: 0,
        phase_start: now,
        timer_seconds,
        is_public: request.is_public,
        created_at: now,
    };

    let match_row = store.insert_match(row).await?;
    store.insert_solutions(request.quiz.solutions(id)).await?;

    let host_name = if request.host_name.trim().is_empty() {
        "Host".to_string()
    } else {
        request.host_name
    };
    let host = store
        .insert_player(PlayerRow {
            match_id: id,
            uid: host_uid,
            name: host_name,
            joined_at: now,
            ready: false,
            answered: false,
            score: 0,
        })
        .await?;

    info!(match_id = %id, quiz = %match_row.quiz_name, "match created");

    Ok(MatchView {
        match_row,
        players: vec![host],
        answers: Vec::new(),
    })
}

/// Join an existing match as the second player. Fails with a capacity error
/// once two players are present.
pub async fn join_match(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
    uid: UserId,
    name: String,
) -> Result<PlayerRow, ServiceError> {
    let name = if name.trim().is_empty() {
        "Player".to_string()
    } else {
        name
    };

    let player = store
        .insert_player(PlayerRow {
            match_id,
            uid,
            name,
            joined_at: OffsetDateTime::now_utc(),
            ready: false,
            answered: false,
            score: 0,
        })
        .await?;

    info!(match_id = %match_id, uid = %player.uid, "player joined");
    Ok(player)
}

/// Set a player's phase-dependent ready flag.
pub async fn set_ready(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
    uid: UserId,
    ready: bool,
) -> Result<PlayerRow, ServiceError> {
    store
        .update_player(match_id, uid.clone(), PlayerPatch::ready(ready))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{uid}` in match `{match_id}`")))
}

/// Submit (or overwrite) the caller's answer for the current question and
/// flag the player as answered.
///
/// The answer upsert and the presence-flag patch are two separate writes;
/// other clients may observe them in either order, which the presence
/// predicates tolerate by only ever reading the player flags.
pub async fn submit_answer(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
    uid: UserId,
    choice_index: usize,
) -> Result<AnswerRow, ServiceError> {
    let match_row = store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}`")))?;

    if match_row.status != MatchStatus::Answering {
        return Err(ServiceError::InvalidState(format!(
            "answers are only accepted while answering (status is {})",
            match_row.status
        )));
    }

    let question_index = match_row.current_question_index;
    let question = match_row.current_question().ok_or_else(|| {
        ServiceError::InvalidState(format!("question {question_index} is out of range"))
    })?;
    let choice_text = question
        .options
        .get(choice_index)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("choice index {choice_index} is out of range"))
        })?
        .clone();

    let existing = store.list_answers(match_id, question_index).await?;
    if existing
        .iter()
        .any(|a| a.uid == uid && a.is_correct.is_some())
    {
        return Err(ServiceError::InvalidState(
            "this question has already been scored".into(),
        ));
    }

    let row = store
        .upsert_answer(AnswerRow {
            match_id,
            uid: uid.clone(),
            question_index,
            choice_index,
            choice_text,
            is_correct: None,
            points: None,
            submitted_at: OffsetDateTime::now_utc(),
        })
        .await?;
    store
        .update_player(match_id, uid, PlayerPatch::answered(true))
        .await?;

    Ok(row)
}

/// Advance the match to `to`, refreshing `phase_start` so every client's
/// timer is recomputed from one authoritative wall-clock value.
///
/// The write is guarded on the set of valid predecessor statuses, so a
/// duplicate trigger (a late timer, a second listener) affects zero rows and
/// returns `Ok(None)`, which is benign and logged at debug only.
pub async fn start_phase(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
    to: MatchStatus,
    question_index: Option<usize>,
) -> Result<Option<MatchRow>, ServiceError> {
    if matches!(to, MatchStatus::Lobby | MatchStatus::Scoring) {
        return Err(ServiceError::InvalidInput(format!(
            "{to} is not a valid transition target"
        )));
    }

    if to == MatchStatus::QuestionReveal
        && let Some(index) = question_index
    {
        let match_row = store
            .find_match(match_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}`")))?;
        if index >= match_row.question_count() {
            return Err(ServiceError::InvalidInput(format!(
                "question index {index} is out of range"
            )));
        }
    }

    let updated = store
        .transition_match(
            match_id,
            TransitionGuard::StatusIn(expected_predecessors(to)),
            to,
            question_index,
            Some(OffsetDateTime::now_utc()),
        )
        .await?;

    let Some(row) = updated else {
        debug!(match_id = %match_id, to = %to, "transition skipped; another trigger won");
        return Ok(None);
    };

    info!(
        match_id = %match_id,
        status = %row.status,
        question_index = row.current_question_index,
        "phase started"
    );

    // Flag resets tied to phase entry. Derived from a fresh player list and
    // idempotent, so a concurrent duplicate reset converges to the same state.
    match to {
        MatchStatus::QuestionReveal => {
            for player in store.list_players(match_id).await? {
                store
                    .update_player(match_id, player.uid, PlayerPatch::answered(false))
                    .await?;
            }
        }
        MatchStatus::RoundEnd => {
            for player in store.list_players(match_id).await? {
                store
                    .update_player(match_id, player.uid, PlayerPatch::ready(false))
                    .await?;
            }
        }
        _ => {}
    }

    Ok(Some(row))
}

/// Fetch the solution for a question once its round has ended.
pub async fn fetch_solution(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
    question_index: usize,
) -> Result<SolutionView, ServiceError> {
    let match_row = store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}`")))?;

    let round_over = question_index < match_row.current_question_index
        || (question_index == match_row.current_question_index
            && matches!(
                match_row.status,
                MatchStatus::Scoring | MatchStatus::RoundEnd | MatchStatus::Finished
            ));
    if !round_over {
        return Err(ServiceError::InvalidState(
            "solution is not available until the round ends".into(),
        ));
    }

    let solution = store
        .find_solution(match_id, question_index)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("solution for question {question_index}"))
        })?;

    Ok(SolutionView {
        question_index: solution.question_index,
        correct_answer: solution.correct_answer,
        explanation: solution.explanation,
    })
}

/// Bulk snapshot served on connect and reconnect: the match row, every
/// player, and the answers of the current question only.
pub async fn match_view(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
) -> Result<MatchView, ServiceError> {
    let match_row = store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}`")))?;
    let players = store.list_players(match_id).await?;
    let answers = store
        .list_answers(match_id, match_row.current_question_index)
        .await?;

    Ok(MatchView {
        match_row,
        players,
        answers,
    })
}
