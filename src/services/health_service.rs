use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the store and report the degraded flag alongside live counters.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.game_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(
        state.is_degraded(),
        state.sessions().active_id().await,
        state.players().len(),
    )
}
