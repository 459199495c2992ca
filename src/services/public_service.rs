//! Read-only projections of the game exposed to public consumers.

use uuid::Uuid;

use crate::{
    dto::{game::SessionSnapshot, phase::GamePhaseSnapshot},
    error::ServiceError,
    services::game_service,
    state::{Audience, SharedState},
};

/// Return the current engine phase, the session it concerns and degraded mode.
pub async fn get_game_phase(state: &SharedState) -> GamePhaseSnapshot {
    let phase = state.state_machine_phase().await;
    let session_id = state.sessions().active_id().await;
    GamePhaseSnapshot::new(&phase, session_id, state.is_degraded())
}

/// Public view of the running session; the answer key stays hidden while a round is open.
pub async fn get_active_state(state: &SharedState) -> Result<SessionSnapshot, ServiceError> {
    game_service::active_state(state, Audience::Public).await
}

/// Public view of any session, including archived ones.
pub async fn get_session_state(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionSnapshot, ServiceError> {
    game_service::request_state(state, session_id, Audience::Public).await
}
