use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::state_machine::{GamePhase, RoundPhase};

/// Publicly visible game phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleGamePhase {
    /// No session has been started yet.
    Idle,
    /// Session started, next round not opened yet.
    RoundWaiting,
    /// Answer window open.
    RoundActive,
    /// Round scored, waiting for the next one.
    RoundEnded,
    /// Last session archived.
    Finished,
}

impl From<&GamePhase> for VisibleGamePhase {
    fn from(value: &GamePhase) -> Self {
        match value {
            GamePhase::Idle => VisibleGamePhase::Idle,
            GamePhase::Active {
                status: RoundPhase::Waiting,
                ..
            } => VisibleGamePhase::RoundWaiting,
            GamePhase::Active {
                status: RoundPhase::Active,
                ..
            } => VisibleGamePhase::RoundActive,
            GamePhase::Active {
                status: RoundPhase::Ended,
                ..
            } => VisibleGamePhase::RoundEnded,
            GamePhase::Finished => VisibleGamePhase::Finished,
        }
    }
}

/// Snapshot of the engine phase together with the session it concerns.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct GamePhaseSnapshot {
    pub phase: VisibleGamePhase,
    pub session_id: Option<Uuid>,
    /// Round the phase refers to, when a session is active.
    pub round: Option<u32>,
    pub degraded: bool,
}

impl GamePhaseSnapshot {
    pub fn new(phase: &GamePhase, session_id: Option<Uuid>, degraded: bool) -> Self {
        let round = match phase {
            GamePhase::Active { round, .. } => Some(*round),
            _ => None,
        };
        Self {
            phase: phase.into(),
            session_id,
            round,
            degraded,
        }
    }
}
