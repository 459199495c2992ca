use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::AnswerChoice,
    dto::{
        game::{AnswerView, RoundEndReason, ScoreEntry, SessionSnapshot},
        participant::ParticipantSummary,
        phase::GamePhaseSnapshot,
        question::QuestionView,
    },
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Gameplay events pushed to the display and operator audiences.
///
/// Serialised as `{"type": <name>, "data": <payload>}`; the name doubles as the SSE event name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum GameBroadcast {
    #[serde(rename = "game:started")]
    GameStarted(SessionSnapshot),
    #[serde(rename = "round:started")]
    RoundStarted(RoundStartedEvent),
    #[serde(rename = "timer:update")]
    TimerUpdate(TimerUpdateEvent),
    #[serde(rename = "answer:recorded")]
    AnswerRecorded(AnswerRecordedEvent),
    #[serde(rename = "round:ended")]
    RoundEnded(RoundEndedEvent),
    #[serde(rename = "game:ended")]
    GameEnded(GameEndedEvent),
}

impl GameBroadcast {
    pub fn name(&self) -> &'static str {
        match self {
            GameBroadcast::GameStarted(_) => "game:started",
            GameBroadcast::RoundStarted(_) => "round:started",
            GameBroadcast::TimerUpdate(_) => "timer:update",
            GameBroadcast::AnswerRecorded(_) => "answer:recorded",
            GameBroadcast::RoundEnded(_) => "round:ended",
            GameBroadcast::GameEnded(_) => "game:ended",
        }
    }
}

/// Operational events that are not part of the gameplay stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SystemBroadcast {
    #[serde(rename = "phase_changed")]
    PhaseChanged(GamePhaseSnapshot),
    #[serde(rename = "participant.registered")]
    ParticipantRegistered(ParticipantSummary),
    #[serde(rename = "participant.updated")]
    ParticipantUpdated(ParticipantSummary),
    #[serde(rename = "participant.deleted")]
    ParticipantDeleted { participant_id: Uuid },
    #[serde(rename = "system.status")]
    SystemStatus(SystemStatus),
    #[serde(rename = "handshake")]
    Handshake(Handshake),
    /// Sent on the admin stream only, right after it connects.
    #[serde(rename = "admin_token")]
    AdminToken(Handshake),
}

impl SystemBroadcast {
    pub fn name(&self) -> &'static str {
        match self {
            SystemBroadcast::PhaseChanged(_) => "phase_changed",
            SystemBroadcast::ParticipantRegistered(_) => "participant.registered",
            SystemBroadcast::ParticipantUpdated(_) => "participant.updated",
            SystemBroadcast::ParticipantDeleted { .. } => "participant.deleted",
            SystemBroadcast::SystemStatus(_) => "system.status",
            SystemBroadcast::Handshake(_) => "handshake",
            SystemBroadcast::AdminToken(_) => "admin_token",
        }
    }
}

/// Wire envelope adding the emission time to a broadcast body.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, B: Serialize> {
    #[serde(flatten)]
    pub body: &'a B,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`public` or `admin`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Admin token returned only on the privileged stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundStartedEvent {
    pub session_id: Uuid,
    pub round: u32,
    pub total_rounds: u32,
    /// Carries the answer key on the admin stream only.
    pub question: QuestionView,
    pub time_remaining_ms: u64,
    pub ends_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimerUpdateEvent {
    pub session_id: Uuid,
    pub round: u32,
    pub time_remaining_ms: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Progress of the current round, without the chosen option.
pub struct AnswerRecordedEvent {
    pub session_id: Uuid,
    pub round: u32,
    pub participant_id: Uuid,
    pub answered_count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundEndedEvent {
    pub session_id: Uuid,
    pub round: u32,
    pub question_id: Uuid,
    pub correct_answer: AnswerChoice,
    pub reason: RoundEndReason,
    /// Running totals in seat order.
    pub scores: Vec<ScoreEntry>,
    /// Answers given to this round's question.
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameEndedEvent {
    pub session_id: Uuid,
    /// Final ranking: highest score first, ties broken by lowest position.
    pub scores: Vec<ScoreEntry>,
    pub winner: Option<ScoreEntry>,
}
