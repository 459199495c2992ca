//! Broadcast gateway: turns engine outcomes into events for the admin and public audiences.

use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::{
    dto::{
        format_system_time,
        game::{AnswerView, RoundEndReason, ScoreEntry, SessionSnapshot},
        millis,
        participant::ParticipantSummary,
        phase::GamePhaseSnapshot,
        question::QuestionView,
        sse::{
            AnswerRecordedEvent, Envelope, GameBroadcast, GameEndedEvent,
            RoundEndedEvent, RoundStartedEvent, ServerEvent, SystemBroadcast, SystemStatus,
            TimerUpdateEvent,
        },
    },
    state::{AppState, Audience, game::GameSession, state_machine::GamePhase},
};

const EVERYONE: &[Audience] = &[Audience::Admin, Audience::Public];
const OPERATORS: &[Audience] = &[Audience::Admin];

/// Announce a freshly seated session.
pub fn broadcast_game_started(state: &AppState, session: &GameSession) {
    let now = SystemTime::now();
    for &audience in EVERYONE {
        let snapshot = SessionSnapshot::build(session, now, audience);
        send_game(state, &[audience], &GameBroadcast::GameStarted(snapshot));
    }
}

/// Announce the question of a newly opened round; only operators see the answer key.
pub fn broadcast_round_started(state: &AppState, session: &GameSession) {
    let Some(question) = session.current_question.as_ref() else {
        warn!(session_id = %session.id, "round started without a question");
        return;
    };
    let remaining = session.time_remaining(SystemTime::now());
    let ends_at = session
        .round_end_time
        .map(format_system_time)
        .unwrap_or_default();

    for &audience in EVERYONE {
        let body = GameBroadcast::RoundStarted(RoundStartedEvent {
            session_id: session.id,
            round: session.current_round,
            total_rounds: session.total_rounds,
            question: QuestionView::new(question, audience == Audience::Admin),
            time_remaining_ms: millis(remaining),
            ends_at: ends_at.clone(),
        });
        send_game(state, &[audience], &body);
    }
}

pub fn broadcast_timer_update(state: &AppState, session_id: Uuid, round: u32, remaining: Duration) {
    let body = GameBroadcast::TimerUpdate(TimerUpdateEvent {
        session_id,
        round,
        time_remaining_ms: millis(remaining),
    });
    send_game(state, EVERYONE, &body);
}

/// Report answering progress to operators without disclosing the chosen option.
pub fn broadcast_answer_recorded(state: &AppState, session: &GameSession, participant_id: Uuid) {
    let body = GameBroadcast::AnswerRecorded(AnswerRecordedEvent {
        session_id: session.id,
        round: session.current_round,
        participant_id,
        answered_count: session.answered_count(),
    });
    send_game(state, OPERATORS, &body);
}

/// Reveal the answer key and running totals once a round closes.
pub fn broadcast_round_ended(state: &AppState, session: &GameSession, reason: RoundEndReason) {
    let Some(question) = session.current_question.as_ref() else {
        warn!(session_id = %session.id, "round ended without a question");
        return;
    };
    let body = GameBroadcast::RoundEnded(RoundEndedEvent {
        session_id: session.id,
        round: session.current_round,
        question_id: question.id,
        correct_answer: question.correct_answer,
        reason,
        scores: session.participants.iter().map(ScoreEntry::from).collect(),
        answers: session
            .answers
            .iter()
            .filter(|answer| answer.question_id == question.id)
            .map(AnswerView::from)
            .collect(),
    });
    send_game(state, EVERYONE, &body);
}

/// Announce the final ranking and the winner.
pub fn broadcast_game_ended(state: &AppState, session: &GameSession) {
    let scores: Vec<ScoreEntry> = session
        .standings()
        .into_iter()
        .map(ScoreEntry::from)
        .collect();
    let winner = session
        .winner_id
        .and_then(|id| scores.iter().find(|entry| entry.participant_id == id))
        .cloned();
    let body = GameBroadcast::GameEnded(GameEndedEvent {
        session_id: session.id,
        scores,
        winner,
    });
    send_game(state, EVERYONE, &body);
}

/// Broadcast a gameplay phase change notification.
pub fn broadcast_phase_changed(state: &AppState, phase: &GamePhase, session_id: Option<Uuid>) {
    let snapshot = GamePhaseSnapshot::new(phase, session_id, state.is_degraded());
    send_system(state, EVERYONE, &SystemBroadcast::PhaseChanged(snapshot));
}

pub fn broadcast_participant_registered(state: &AppState, participant: ParticipantSummary) {
    send_system(
        state,
        OPERATORS,
        &SystemBroadcast::ParticipantRegistered(participant),
    );
}

pub fn broadcast_participant_updated(state: &AppState, participant: ParticipantSummary) {
    send_system(
        state,
        OPERATORS,
        &SystemBroadcast::ParticipantUpdated(participant),
    );
}

pub fn broadcast_participant_deleted(state: &AppState, participant_id: Uuid) {
    send_system(
        state,
        OPERATORS,
        &SystemBroadcast::ParticipantDeleted { participant_id },
    );
}

/// Broadcast that the backend entered or left degraded mode.
pub fn broadcast_system_status(state: &AppState, degraded: bool) {
    send_system(
        state,
        EVERYONE,
        &SystemBroadcast::SystemStatus(SystemStatus { degraded }),
    );
}

/// Serialise `body` once per call and push it to every listed audience.
pub(crate) fn send_system(state: &AppState, audiences: &[Audience], body: &SystemBroadcast) {
    send(state, audiences, body.name(), body);
}

fn send_game(state: &AppState, audiences: &[Audience], body: &GameBroadcast) {
    send(state, audiences, body.name(), body);
}

fn send(state: &AppState, audiences: &[Audience], name: &'static str, body: &impl Serialize) {
    let envelope = Envelope {
        body,
        timestamp: format_system_time(SystemTime::now()),
    };
    match ServerEvent::json(Some(name.to_string()), &envelope) {
        Ok(event) => {
            for &audience in audiences {
                trace!(event = name, ?audience, "broadcasting event");
                state.hub(audience).broadcast(event.clone());
            }
        }
        Err(err) => warn!(event = name, error = %err, "failed to serialize SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::AnswerChoice,
        state::game::{
            GameQuestion,
            tests::{participant, question},
        },
    };

    fn running_session() -> GameSession {
        let now = SystemTime::now();
        let mut session = GameSession::new(
            vec![participant("Ana"), participant("Bia"), participant("Caio")],
            None,
            2,
            now,
        )
        .unwrap();
        session.begin_round(
            1,
            GameQuestion::from_bank(question(AnswerChoice::B), 1),
            now,
            Duration::from_secs(30),
        );
        session
    }

    fn data(event: &ServerEvent) -> Value {
        serde_json::from_str::<Value>(&event.data).unwrap()["data"].clone()
    }

    #[tokio::test]
    async fn round_started_reveals_answer_key_to_admin_only() {
        let state = AppState::new(AppConfig::default());
        let mut admin = state.admin_sse().subscribe();
        let mut public = state.public_sse().subscribe();

        broadcast_round_started(&state, &running_session());

        let admin_event = admin.recv().await.unwrap();
        let public_event = public.recv().await.unwrap();
        assert_eq!(admin_event.event.as_deref(), Some("round:started"));
        assert_eq!(public_event.event.as_deref(), Some("round:started"));
        assert_eq!(data(&admin_event)["question"]["correct_answer"], "B");
        assert!(data(&public_event)["question"].get("correct_answer").is_none());
    }

    #[tokio::test]
    async fn answer_progress_reaches_operators_only() {
        let state = AppState::new(AppConfig::default());
        let mut admin = state.admin_sse().subscribe();
        let mut public = state.public_sse().subscribe();
        let session = running_session();
        let participant_id = session.participants[0].participant_id;

        broadcast_answer_recorded(&state, &session, participant_id);

        let event = admin.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("answer:recorded"));
        assert_eq!(data(&event)["participant_id"], participant_id.to_string());
        assert!(matches!(public.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn game_ended_names_the_winner() {
        let state = AppState::new(AppConfig::default());
        let mut public = state.public_sse().subscribe();
        let mut session = running_session();
        session.participants[2].score = 20;
        session.finish(SystemTime::now());

        broadcast_game_ended(&state, &session);

        let event = public.recv().await.unwrap();
        let payload = data(&event);
        assert_eq!(
            payload["winner"]["participant_id"],
            session.participants[2].participant_id.to_string()
        );
        assert_eq!(payload["scores"][0]["score"], 20);
    }
}
