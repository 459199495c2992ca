use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        game::{AnswerReceipt, SessionSnapshot, SubmitAnswerRequest},
        phase::GamePhaseSnapshot,
        stats::StatisticsResponse,
        ws::PlayerOutboundMessage,
    },
    error::{AppError, ServiceError},
    services::{public_service, stats_service},
    state::SharedState,
};

/// Public endpoints for displays and player devices.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/phase", get(get_game_phase))
        .route("/public/state", get(get_active_state))
        .route("/public/sessions/{id}/state", get(get_session_state))
        .route("/public/answers", post(submit_answer))
        .route("/public/statistics", get(get_statistics))
}

#[utoipa::path(
    get,
    path = "/public/phase",
    tag = "public",
    responses((status = 200, description = "Current game phase", body = GamePhaseSnapshot))
)]
/// Return the high-level phase the engine is in.
pub async fn get_game_phase(State(state): State<SharedState>) -> Json<GamePhaseSnapshot> {
    Json(public_service::get_game_phase(&state).await)
}

#[utoipa::path(
    get,
    path = "/public/state",
    tag = "public",
    responses(
        (status = 200, description = "Snapshot of the active session", body = SessionSnapshot),
        (status = 404, description = "No active session")
    )
)]
pub async fn get_active_state(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(public_service::get_active_state(&state).await?))
}

#[utoipa::path(
    get,
    path = "/public/sessions/{id}/state",
    tag = "public",
    params(("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session_state(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(public_service::get_session_state(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/public/answers",
    tag = "public",
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerReceipt),
        (status = 409, description = "Answer rejected", body = PlayerOutboundMessage)
    )
)]
/// Submit an answer for players without a WebSocket connection.
pub async fn submit_answer(
    State(state): State<SharedState>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Response, AppError> {
    let question_id = payload.question_id;
    match state.commands().submit_answer(payload).await {
        Ok(receipt) => Ok(Json(receipt).into_response()),
        Err(ServiceError::AnswerRejected(reason)) => Ok((
            StatusCode::CONFLICT,
            Json(PlayerOutboundMessage::AnswerRejected {
                question_id,
                reason,
            }),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}

#[utoipa::path(
    get,
    path = "/public/statistics",
    tag = "public",
    responses((status = 200, description = "Aggregated statistics", body = StatisticsResponse))
)]
pub async fn get_statistics(
    State(state): State<SharedState>,
) -> Result<Json<StatisticsResponse>, AppError> {
    Ok(Json(stats_service::statistics(&state).await?))
}
