//! Game session commands. Every function here runs on the command worker, one at a time.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::{MAX_TOTAL_ROUNDS, RoundAdvance},
    dao::{
        game_store::GameStore,
        models::{
            ClaimOutcome, Difficulty, ParticipantStatus, QuestionEntity, QuestionQuery,
            RoundStatus, SessionStatus,
        },
    },
    dto::game::{
        AnswerReceipt, RoundEndReason, SessionListItem, SessionSnapshot, StartGameRequest,
        SubmitAnswerRequest,
    },
    error::ServiceError,
    services::{command_queue::GameCommand, round_timer, sse_events},
    state::{
        Audience, ScheduledKind, SharedState,
        game::{GameQuestion, GameSession, validate_selection},
        state_machine::GameEvent,
        transitions::run_transition_with_broadcast,
    },
};

/// Seat three waiting participants in a new active session.
pub async fn start_game(
    state: &SharedState,
    request: StartGameRequest,
) -> Result<GameSession, ServiceError> {
    let StartGameRequest {
        participant_ids,
        theme_id,
        total_rounds,
    } = request;

    validate_selection(&participant_ids)?;
    let total_rounds = total_rounds.unwrap_or_else(|| state.config().total_rounds());
    if !(1..=MAX_TOTAL_ROUNDS).contains(&total_rounds) {
        return Err(ServiceError::InvalidInput(format!(
            "total_rounds must be between 1 and {MAX_TOTAL_ROUNDS}"
        )));
    }
    if let Some(active) = state.sessions().active_id().await {
        return Err(ServiceError::ConflictingSession(format!(
            "session `{active}` is still running"
        )));
    }

    let store = state.require_game_store().await?;
    if let Some(theme_id) = theme_id {
        let lookup = store.find_theme(theme_id);
        let theme = state
            .bounded(async move { lookup.await.map_err(ServiceError::from) })
            .await?;
        if theme.is_none() {
            return Err(ServiceError::NotFound(format!("theme `{theme_id}` not found")));
        }
    }

    let session = run_transition_with_broadcast(state, GameEvent::StartGame, || {
        seat_participants(store, participant_ids, theme_id, total_rounds)
    })
    .await?;

    state.cancel_scheduled().await;
    sse_events::broadcast_game_started(state, &session);
    info!(
        session_id = %session.id,
        total_rounds = session.total_rounds,
        participants = ?session.participant_ids(),
        "game session started"
    );
    Ok(session)
}

async fn seat_participants(
    store: Arc<dyn GameStore>,
    participant_ids: Vec<Uuid>,
    theme_id: Option<Uuid>,
    total_rounds: u32,
) -> Result<GameSession, ServiceError> {
    let participants = match store.claim_participants(participant_ids.clone()).await? {
        ClaimOutcome::Claimed(participants) => participants,
        ClaimOutcome::Rejected {
            unknown,
            unavailable,
        } => {
            let mut reasons = Vec::new();
            if !unknown.is_empty() {
                reasons.push(format!("unknown participants {unknown:?}"));
            }
            if !unavailable.is_empty() {
                reasons.push(format!("participants not waiting {unavailable:?}"));
            }
            return Err(ServiceError::InvalidSelection(reasons.join("; ")));
        }
    };

    let seats = ClaimedSeats {
        store: store.clone(),
        ids: Some(participant_ids),
    };
    let session = GameSession::new(participants, theme_id, total_rounds, SystemTime::now())?;
    store.save_session(session.clone().into()).await?;
    seats.keep();
    Ok(session)
}

/// Claimed participants of a start in progress; dropping it releases them back to waiting.
///
/// Also covers a start abandoned mid-await by the transition timeout.
struct ClaimedSeats {
    store: Arc<dyn GameStore>,
    ids: Option<Vec<Uuid>>,
}

impl ClaimedSeats {
    fn keep(mut self) {
        self.ids = None;
    }
}

impl Drop for ClaimedSeats {
    fn drop(&mut self) {
        let Some(ids) = self.ids.take() else {
            return;
        };
        debug!(participants = ?ids, "releasing participants of an aborted start");
        let release = self.store.release_participants(ids, ParticipantStatus::Waiting);
        tokio::spawn(async move {
            if let Err(err) = release.await {
                warn!(error = %err, "failed to release participants after aborted start");
            }
        });
    }
}

/// Open the answer window of `round` with a freshly drawn question.
pub async fn start_round(
    state: &SharedState,
    session_id: Uuid,
    round: u32,
) -> Result<GameSession, ServiceError> {
    let session = active_session(state, session_id).await?;

    let expected = match session.round_status {
        RoundStatus::Waiting => session.current_round,
        RoundStatus::Finished => session.current_round + 1,
        RoundStatus::Active => {
            return Err(ServiceError::ConflictingSession(format!(
                "round {} is still running",
                session.current_round
            )));
        }
    };
    if round != expected || round > session.total_rounds {
        return Err(ServiceError::ConflictingSession(format!(
            "cannot start round {round}; next round is {expected} of {}",
            session.total_rounds
        )));
    }

    let store = state.require_game_store().await?;
    let config = state.config();
    let session = run_transition_with_broadcast(state, GameEvent::StartRound(round), || async move {
        let question = draw_question(&store, &session, config.difficulty_for_round(round)).await?;
        let mut next = session;
        next.begin_round(
            round,
            GameQuestion::from_bank(question, round),
            SystemTime::now(),
            config.question_duration(),
        );
        store.save_session(next.clone().into()).await?;
        Ok(next)
    })
    .await?;

    sse_events::broadcast_round_started(state, &session);
    let ends_at = session.round_end_time.unwrap_or_else(SystemTime::now);
    let timer = round_timer::spawn(state.clone(), session.id, round, ends_at);
    state
        .schedule(ScheduledKind::RoundTimer, session.id, round, timer)
        .await;

    info!(session_id = %session.id, round, "round started");
    Ok(session)
}

async fn draw_question(
    store: &Arc<dyn GameStore>,
    session: &GameSession,
    difficulty: Option<Difficulty>,
) -> Result<QuestionEntity, ServiceError> {
    let query = QuestionQuery {
        theme_id: session.theme_id,
        difficulty,
        excluding: session.asked_question_ids.clone(),
    };
    if let Some(question) = store.next_question(query.clone()).await? {
        return Ok(question);
    }
    if difficulty.is_some() {
        debug!(session_id = %session.id, ?difficulty, "no question at requested difficulty; widening");
        let widened = QuestionQuery {
            difficulty: None,
            ..query
        };
        if let Some(question) = store.next_question(widened).await? {
            return Ok(question);
        }
    }
    Err(ServiceError::NotFound(
        "no unused question left in the question bank".into(),
    ))
}

/// Record an answer for the active round.
pub async fn submit_answer(
    state: &SharedState,
    request: SubmitAnswerRequest,
) -> Result<AnswerReceipt, ServiceError> {
    submit_answer_at(state, request, SystemTime::now()).await
}

pub(crate) async fn submit_answer_at(
    state: &SharedState,
    request: SubmitAnswerRequest,
    now: SystemTime,
) -> Result<AnswerReceipt, ServiceError> {
    let Some(mut session) = state.sessions().active().await else {
        return Err(ServiceError::ConflictingSession(
            "no session is running".into(),
        ));
    };
    let SubmitAnswerRequest {
        participant_id,
        question_id,
        answer,
    } = request;

    let config = state.config();
    let recorded =
        match session.record_answer(participant_id, question_id, answer, now, config.scoring()) {
            Ok(recorded) => recorded,
            Err(err) => {
                debug!(
                    session_id = %session.id,
                    %participant_id,
                    %question_id,
                    error = %err,
                    "answer rejected"
                );
                return Err(err.into());
            }
        };

    let store = state.require_game_store().await?;
    let entity = session.clone().into();
    state
        .bounded(async move { store.save_session(entity).await.map_err(ServiceError::from) })
        .await?;
    state.sessions().commit(session.clone()).await;

    debug!(
        session_id = %session.id,
        %participant_id,
        correct = recorded.correct,
        points = recorded.points,
        "answer recorded"
    );
    sse_events::broadcast_answer_recorded(state, &session, participant_id);

    let receipt = AnswerReceipt::new(session.id, &recorded);
    if session.all_answered() {
        if let Err(err) = end_round(state, session, RoundEndReason::AllAnswered).await {
            warn!(
                error = %err,
                "failed to close round after every participant answered; its timer will close it"
            );
        }
    }
    Ok(receipt)
}

/// Close the running round before its timer elapses.
pub async fn force_end_round(
    state: &SharedState,
    session_id: Uuid,
) -> Result<GameSession, ServiceError> {
    let session = active_session(state, session_id).await?;
    if session.round_status != RoundStatus::Active {
        return Err(ServiceError::ConflictingSession(
            "no round is running".into(),
        ));
    }
    end_round(state, session, RoundEndReason::Forced).await
}

/// Archive the session immediately, whatever the round state.
pub async fn force_end_game(
    state: &SharedState,
    session_id: Uuid,
) -> Result<GameSession, ServiceError> {
    let session = active_session(state, session_id).await?;
    end_game(state, session).await
}

async fn end_round(
    state: &SharedState,
    session: GameSession,
    reason: RoundEndReason,
) -> Result<GameSession, ServiceError> {
    let store = state.require_game_store().await?;
    let session = run_transition_with_broadcast(state, GameEvent::EndRound, || async move {
        let mut next = session;
        next.finish_round(SystemTime::now());
        store.save_session(next.clone().into()).await?;
        Ok(next)
    })
    .await?;

    state.cancel_scheduled().await;
    sse_events::broadcast_round_ended(state, &session, reason);
    info!(
        session_id = %session.id,
        round = session.current_round,
        ?reason,
        "round ended"
    );

    if session.is_last_round() {
        return end_game(state, session).await;
    }
    if let RoundAdvance::Auto { delay } = state.config().round_advance() {
        schedule_auto_advance(state, &session, delay).await;
    }
    Ok(session)
}

async fn end_game(state: &SharedState, session: GameSession) -> Result<GameSession, ServiceError> {
    let store = state.require_game_store().await?;
    let release_to = state.config().post_game_status();
    let participant_ids = session.participant_ids();

    let session = run_transition_with_broadcast(state, GameEvent::EndGame, || async move {
        let mut next = session;
        next.finish(SystemTime::now());
        store.save_session(next.clone().into()).await?;
        store
            .release_participants(participant_ids, release_to)
            .await?;
        Ok(next)
    })
    .await?;

    state.cancel_scheduled().await;
    sse_events::broadcast_game_ended(state, &session);
    info!(
        session_id = %session.id,
        winner_id = ?session.winner_id,
        "game session finished"
    );
    Ok(session)
}

async fn schedule_auto_advance(state: &SharedState, session: &GameSession, delay: Duration) {
    let session_id = session.id;
    let round = session.current_round + 1;
    let queue = state.commands().clone();
    let handle = tokio::spawn(async move {
        sleep(delay).await;
        if queue
            .enqueue(GameCommand::AutoAdvance { session_id, round })
            .is_err()
        {
            debug!(%session_id, round, "command queue closed; dropping auto advance");
        }
    });
    state
        .schedule(ScheduledKind::AutoAdvance, session_id, round, handle)
        .await;
    debug!(%session_id, round, delay_ms = delay.as_millis() as u64, "next round scheduled");
}

/// Close the round whose answer window elapsed, unless it already ended.
pub async fn on_round_timer_expired(
    state: &SharedState,
    session_id: Uuid,
    round: u32,
) -> Result<(), ServiceError> {
    let Some(session) = state.sessions().active().await.filter(|session| {
        session.id == session_id
            && session.current_round == round
            && session.round_status == RoundStatus::Active
    }) else {
        debug!(%session_id, round, "dropping stale round timer expiry");
        return Ok(());
    };
    end_round(state, session, RoundEndReason::Timer)
        .await
        .map(|_| ())
}

/// Start the next round on its own once the inter-round pause elapsed.
pub async fn on_auto_advance(
    state: &SharedState,
    session_id: Uuid,
    round: u32,
) -> Result<(), ServiceError> {
    let still_due = state.sessions().active().await.is_some_and(|session| {
        session.id == session_id
            && session.round_status == RoundStatus::Finished
            && session.current_round + 1 == round
    });
    if !still_due {
        debug!(%session_id, round, "dropping stale auto advance");
        return Ok(());
    }
    start_round(state, session_id, round).await.map(|_| ())
}

/// Full snapshot of any session, from memory or from the store for archived ones.
pub async fn request_state(
    state: &SharedState,
    session_id: Uuid,
    audience: Audience,
) -> Result<SessionSnapshot, ServiceError> {
    let now = SystemTime::now();
    if let Some(session) = state.sessions().get(session_id) {
        return Ok(SessionSnapshot::build(&session, now, audience));
    }

    let store = state.require_game_store().await?;
    let entity = store
        .find_session(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;
    let session = GameSession::try_from(entity)?;
    Ok(SessionSnapshot::build(&session, now, audience))
}

/// Snapshot of the running session.
pub async fn active_state(
    state: &SharedState,
    audience: Audience,
) -> Result<SessionSnapshot, ServiceError> {
    let session = state
        .sessions()
        .active()
        .await
        .ok_or_else(|| ServiceError::NotFound("no active session".into()))?;
    Ok(SessionSnapshot::build(&session, SystemTime::now(), audience))
}

/// Persisted sessions, optionally filtered by status.
pub async fn list_sessions(
    state: &SharedState,
    status: Option<SessionStatus>,
) -> Result<Vec<SessionListItem>, ServiceError> {
    let store = state.require_game_store().await?;
    let entities = store.list_sessions(status).await?;
    entities
        .into_iter()
        .map(|entity| {
            GameSession::try_from(entity)
                .map(|session| SessionListItem::from(&session))
                .map_err(ServiceError::from)
        })
        .collect()
}

async fn active_session(state: &SharedState, session_id: Uuid) -> Result<GameSession, ServiceError> {
    if let Some(session) = state.sessions().active().await {
        if session.id == session_id {
            return Ok(session);
        }
    }

    let known = match state.sessions().get(session_id) {
        Some(_) => true,
        None => match state.game_store().await {
            Some(store) => store.find_session(session_id).await?.is_some(),
            None => false,
        },
    };
    if known {
        Err(ServiceError::ConflictingSession(format!(
            "session `{session_id}` is not the active session"
        )))
    } else {
        Err(ServiceError::NotFound(format!(
            "session `{session_id}` not found"
        )))
    }
}
