use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::MAX_TOTAL_ROUNDS,
    dao::models::{AnswerChoice, RoundStatus, SessionStatus},
    dto::{format_system_time, millis, question::QuestionView},
    state::{
        Audience,
        game::{GameParticipant, GameSession, RecordedAnswer},
    },
};

/// Payload used to start a session with three waiting participants.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct StartGameRequest {
    /// Seat order follows the order of this list.
    pub participant_ids: Vec<Uuid>,
    pub theme_id: Option<Uuid>,
    /// Falls back to the configured number of rounds when omitted.
    #[validate(range(min = 1, max = MAX_TOTAL_ROUNDS))]
    pub total_rounds: Option<u32>,
}

/// Payload used to open the answer window of a round.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema, Validate)]
pub struct StartRoundRequest {
    #[validate(range(min = 1, max = MAX_TOTAL_ROUNDS))]
    pub round_number: u32,
}

/// Answer submitted by a seated participant.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    pub participant_id: Uuid,
    pub question_id: Uuid,
    pub answer: AnswerChoice,
}

/// Acknowledgement returned to the player whose answer was recorded.
///
/// Correctness is not revealed before the round ends.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerReceipt {
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub round: u32,
    pub answered_at: String,
}

impl AnswerReceipt {
    pub fn new(session_id: Uuid, answer: &RecordedAnswer) -> Self {
        Self {
            session_id,
            question_id: answer.question_id,
            round: answer.round,
            answered_at: format_system_time(answer.answered_at),
        }
    }
}

/// Score line of a seated participant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreEntry {
    pub participant_id: Uuid,
    pub name: String,
    pub position: u8,
    pub score: u32,
}

impl From<&GameParticipant> for ScoreEntry {
    fn from(value: &GameParticipant) -> Self {
        Self {
            participant_id: value.participant_id,
            name: value.name.clone(),
            position: value.position,
            score: value.score,
        }
    }
}

/// Why a round stopped accepting answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    /// The answer window elapsed.
    Timer,
    /// Every seated participant answered.
    AllAnswered,
    /// An operator closed the round.
    Forced,
}

/// Answer as shown once it may be disclosed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerView {
    pub participant_id: Uuid,
    pub question_id: Uuid,
    pub round: u32,
    pub answer: AnswerChoice,
    pub correct: bool,
    pub points: u32,
    pub answered_at: String,
}

impl From<&RecordedAnswer> for AnswerView {
    fn from(value: &RecordedAnswer) -> Self {
        Self {
            participant_id: value.participant_id,
            question_id: value.question_id,
            round: value.round,
            answer: value.answer,
            correct: value.correct,
            points: value.points,
            answered_at: format_system_time(value.answered_at),
        }
    }
}

/// Full view of a session for late joiners and operators.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub status: SessionStatus,
    pub theme_id: Option<Uuid>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub round_status: RoundStatus,
    pub started_at: String,
    pub ended_at: Option<String>,
    /// Seats in position order.
    pub participants: Vec<ScoreEntry>,
    pub current_question: Option<QuestionView>,
    pub time_remaining_ms: u64,
    /// Who already answered the current question.
    pub answered_participant_ids: Vec<Uuid>,
    /// Every recorded answer; only disclosed to admins or once the round closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerView>>,
    pub winner_id: Option<Uuid>,
}

impl SessionSnapshot {
    /// Project `session` for `audience`; the answer key stays hidden from the public while a
    /// round is open.
    pub fn build(session: &GameSession, now: SystemTime, audience: Audience) -> Self {
        let disclose = audience == Audience::Admin || session.round_status != RoundStatus::Active;
        let current_question_id = session.current_question.as_ref().map(|q| q.id);

        Self {
            id: session.id,
            status: session.status,
            theme_id: session.theme_id,
            current_round: session.current_round,
            total_rounds: session.total_rounds,
            round_status: session.round_status,
            started_at: format_system_time(session.started_at),
            ended_at: session.ended_at.map(format_system_time),
            participants: session.participants.iter().map(ScoreEntry::from).collect(),
            current_question: session
                .current_question
                .as_ref()
                .map(|question| QuestionView::new(question, disclose)),
            time_remaining_ms: millis(session.time_remaining(now)),
            answered_participant_ids: session
                .answers
                .iter()
                .filter(|answer| Some(answer.question_id) == current_question_id)
                .map(|answer| answer.participant_id)
                .collect(),
            answers: disclose.then(|| session.answers.iter().map(AnswerView::from).collect()),
            winner_id: session.winner_id,
        }
    }
}

/// Filters accepted by the session listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionListQuery {
    pub status: Option<SessionStatus>,
}

/// Compact row of the session listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionListItem {
    pub id: Uuid,
    pub status: SessionStatus,
    pub theme_id: Option<Uuid>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub winner_id: Option<Uuid>,
    pub participants: Vec<ScoreEntry>,
}

impl From<&GameSession> for SessionListItem {
    fn from(value: &GameSession) -> Self {
        Self {
            id: value.id,
            status: value.status,
            theme_id: value.theme_id,
            current_round: value.current_round,
            total_rounds: value.total_rounds,
            started_at: format_system_time(value.started_at),
            ended_at: value.ended_at.map(format_system_time),
            winner_id: value.winner_id,
            participants: value.participants.iter().map(ScoreEntry::from).collect(),
        }
    }
}
