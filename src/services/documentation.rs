use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the trivia show backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::websocket::player_socket,
        crate::routes::admin::start_game,
        crate::routes::admin::start_round,
        crate::routes::admin::end_round,
        crate::routes::admin::end_game,
        crate::routes::admin::game_state,
        crate::routes::admin::list_sessions,
        crate::routes::admin::list_participants,
        crate::routes::admin::create_participant,
        crate::routes::admin::get_participant,
        crate::routes::admin::update_participant,
        crate::routes::admin::delete_participant,
        crate::routes::admin::list_themes,
        crate::routes::admin::create_theme,
        crate::routes::admin::delete_theme,
        crate::routes::admin::list_questions,
        crate::routes::admin::create_question,
        crate::routes::admin::get_question,
        crate::routes::admin::update_question,
        crate::routes::admin::delete_question,
        crate::routes::admin::statistics,
        crate::routes::public::get_game_phase,
        crate::routes::public::get_active_state,
        crate::routes::public::get_session_state,
        crate::routes::public::submit_answer,
        crate::routes::public::get_statistics,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerOutboundMessage,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::RoundStartedEvent,
            crate::dto::sse::TimerUpdateEvent,
            crate::dto::sse::AnswerRecordedEvent,
            crate::dto::sse::RoundEndedEvent,
            crate::dto::sse::GameEndedEvent,
            crate::dto::phase::GamePhaseSnapshot,
            crate::dao::models::ParticipantStatus,
            crate::dao::models::SessionStatus,
            crate::dao::models::RoundStatus,
            crate::state::game::RejectReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket operations for player devices"),
        (name = "admin", description = "Session control, requires the admin token"),
        (name = "participants", description = "Participant registry, requires the admin token"),
        (name = "questions", description = "Themes and question bank, requires the admin token"),
        (name = "public", description = "Read-only state and answer submission"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_surface() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/healthcheck",
            "/sse/admin",
            "/ws",
            "/admin/game/start",
            "/admin/game/{id}/rounds",
            "/admin/participants/{id}",
            "/admin/questions",
            "/public/answers",
            "/public/statistics",
        ] {
            assert!(
                paths.iter().any(|path| path.as_str() == expected),
                "missing {expected}"
            );
        }
    }
}
