use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when the store answers, "degraded" otherwise.
    pub status: &'static str,
    /// Session currently running, if any.
    pub active_session_id: Option<Uuid>,
    /// Connected player sockets.
    pub connected_players: usize,
}

impl HealthResponse {
    pub fn new(degraded: bool, active_session_id: Option<Uuid>, connected_players: usize) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" },
            active_session_id,
            connected_players,
        }
    }
}
