use crate::{
    error::ServiceError,
    services::sse_events::broadcast_phase_changed,
    state::{SharedState, game::GameSession, state_machine::GameEvent},
};

/// Execute a planned state-machine transition whose work produces the next session state.
///
/// The session is committed to the registry only once the plan has been applied, and the
/// resulting phase change is broadcast after the commit.
pub async fn run_transition_with_broadcast<F, Fut>(
    state: &SharedState,
    event: GameEvent,
    work: F,
) -> Result<GameSession, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<GameSession, ServiceError>>,
{
    let (session, next) = state.run_transition(event, work).await?;
    match event {
        GameEvent::StartGame => state.sessions().activate(session.clone()).await,
        _ => state.sessions().commit(session.clone()).await,
    }
    broadcast_phase_changed(state, &next, Some(session.id));
    Ok(session)
}
