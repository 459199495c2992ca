use std::time::SystemTime;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        game::{SessionListItem, SessionListQuery, SessionSnapshot, StartGameRequest, StartRoundRequest},
        participant::{
            CreateParticipantRequest, ParticipantListQuery, ParticipantPage, ParticipantSummary,
            UpdateParticipantRequest,
        },
        question::{
            CreateThemeRequest, QuestionInput, QuestionListQuery, QuestionPage, QuestionSummary,
            ThemeSummary,
        },
        stats::StatisticsResponse,
    },
    error::AppError,
    services::{game_service, participant_service, question_service, sse_service, stats_service},
    state::{Audience, SharedState, game::GameSession},
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Operator endpoints driving sessions and curating participants and the question bank.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/game/start", post(start_game))
        .route("/admin/game/{id}/rounds", post(start_round))
        .route("/admin/game/{id}/round/end", post(end_round))
        .route("/admin/game/{id}/end", post(end_game))
        .route("/admin/game/{id}/state", get(game_state))
        .route("/admin/sessions", get(list_sessions))
        .route(
            "/admin/participants",
            get(list_participants).post(create_participant),
        )
        .route(
            "/admin/participants/{id}",
            get(get_participant)
                .put(update_participant)
                .delete(delete_participant),
        )
        .route("/admin/themes", get(list_themes).post(create_theme))
        .route("/admin/themes/{id}", delete(delete_theme))
        .route("/admin/questions", get(list_questions).post(create_question))
        .route(
            "/admin/questions/{id}",
            get(get_question).put(update_question).delete(delete_question),
        )
        .route("/admin/statistics", get(statistics))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

fn admin_snapshot(session: &GameSession) -> Json<SessionSnapshot> {
    Json(SessionSnapshot::build(session, SystemTime::now(), Audience::Admin))
}

/// Seat three participants and open a new session.
#[utoipa::path(
    post,
    path = "/admin/game/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = StartGameRequest,
    responses(
        (status = 201, description = "Session started", body = SessionSnapshot),
        (status = 400, description = "Invalid participant selection"),
        (status = 409, description = "Another session is active")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<StartGameRequest>>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let session = state.commands().start(payload).await?;
    Ok((StatusCode::CREATED, admin_snapshot(&session)))
}

/// Open the answer window of the given round.
#[utoipa::path(
    post,
    path = "/admin/game/{id}/rounds",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the active session")),
    request_body = StartRoundRequest,
    responses(
        (status = 200, description = "Round started", body = SessionSnapshot),
        (status = 409, description = "Round cannot start now")
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<StartRoundRequest>>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state
        .commands()
        .start_round(id, payload.round_number)
        .await?;
    Ok(admin_snapshot(&session))
}

/// Close the current round before its timer runs out.
#[utoipa::path(
    post,
    path = "/admin/game/{id}/round/end",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the active session")),
    responses(
        (status = 200, description = "Round ended", body = SessionSnapshot),
        (status = 409, description = "No round is running")
    )
)]
pub async fn end_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.commands().force_end_round(id).await?;
    Ok(admin_snapshot(&session))
}

/// Finish the session immediately and declare the current leader.
#[utoipa::path(
    post,
    path = "/admin/game/{id}/end",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the active session")),
    responses(
        (status = 200, description = "Session finished", body = SessionSnapshot),
        (status = 409, description = "Session is not active")
    )
)]
pub async fn end_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.commands().force_end_game(id).await?;
    Ok(admin_snapshot(&session))
}

/// Full snapshot of a session, answer key included.
#[utoipa::path(
    get,
    path = "/admin/game/{id}/state",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn game_state(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(
        game_service::request_state(&state, id, Audience::Admin).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/admin/sessions",
    tag = "admin",
    params(SessionListQuery, ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Persisted sessions", body = [SessionListItem]))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<Vec<SessionListItem>>, AppError> {
    Ok(Json(game_service::list_sessions(&state, query.status).await?))
}

#[utoipa::path(
    get,
    path = "/admin/participants",
    tag = "participants",
    params(ParticipantListQuery, ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Registered participants", body = ParticipantPage))
)]
pub async fn list_participants(
    State(state): State<SharedState>,
    Query(query): Query<ParticipantListQuery>,
) -> Result<Json<ParticipantPage>, AppError> {
    Ok(Json(participant_service::list(&state, query).await?))
}

/// Register a contestant.
#[utoipa::path(
    post,
    path = "/admin/participants",
    tag = "participants",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreateParticipantRequest,
    responses((status = 201, description = "Participant registered", body = ParticipantSummary))
)]
pub async fn create_participant(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateParticipantRequest>>,
) -> Result<(StatusCode, Json<ParticipantSummary>), AppError> {
    let summary = participant_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/admin/participants/{id}",
    tag = "participants",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the participant")),
    responses(
        (status = 200, description = "Participant", body = ParticipantSummary),
        (status = 404, description = "Unknown participant")
    )
)]
pub async fn get_participant(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ParticipantSummary>, AppError> {
    Ok(Json(participant_service::get(&state, id).await?))
}

/// Edit a contestant who is not seated in the active session.
#[utoipa::path(
    put,
    path = "/admin/participants/{id}",
    tag = "participants",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the participant")),
    request_body = UpdateParticipantRequest,
    responses(
        (status = 200, description = "Participant updated", body = ParticipantSummary),
        (status = 409, description = "Participant is playing")
    )
)]
pub async fn update_participant(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateParticipantRequest>>,
) -> Result<Json<ParticipantSummary>, AppError> {
    Ok(Json(participant_service::update(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/participants/{id}",
    tag = "participants",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the participant")),
    responses(
        (status = 204, description = "Participant deleted"),
        (status = 409, description = "Participant is playing")
    )
)]
pub async fn delete_participant(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    participant_service::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/themes",
    tag = "questions",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Question themes", body = [ThemeSummary]))
)]
pub async fn list_themes(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ThemeSummary>>, AppError> {
    Ok(Json(question_service::list_themes(&state).await?))
}

#[utoipa::path(
    post,
    path = "/admin/themes",
    tag = "questions",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreateThemeRequest,
    responses((status = 201, description = "Theme created", body = ThemeSummary))
)]
pub async fn create_theme(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateThemeRequest>>,
) -> Result<(StatusCode, Json<ThemeSummary>), AppError> {
    let theme = question_service::create_theme(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(theme)))
}

#[utoipa::path(
    delete,
    path = "/admin/themes/{id}",
    tag = "questions",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the theme")),
    responses(
        (status = 204, description = "Theme deleted"),
        (status = 409, description = "Theme still in use")
    )
)]
pub async fn delete_theme(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    question_service::delete_theme(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/questions",
    tag = "questions",
    params(QuestionListQuery, ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Question bank page", body = QuestionPage))
)]
pub async fn list_questions(
    State(state): State<SharedState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<Json<QuestionPage>, AppError> {
    Ok(Json(question_service::list_questions(&state, query).await?))
}

/// Add a question to the bank.
#[utoipa::path(
    post,
    path = "/admin/questions",
    tag = "questions",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = QuestionInput,
    responses((status = 201, description = "Question created", body = QuestionSummary))
)]
pub async fn create_question(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<QuestionInput>>,
) -> Result<(StatusCode, Json<QuestionSummary>), AppError> {
    let question = question_service::create_question(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[utoipa::path(
    get,
    path = "/admin/questions/{id}",
    tag = "questions",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the question")),
    responses(
        (status = 200, description = "Question", body = QuestionSummary),
        (status = 404, description = "Unknown question")
    )
)]
pub async fn get_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionSummary>, AppError> {
    Ok(Json(question_service::get_question(&state, id).await?))
}

/// Replace a question that is not being asked right now.
#[utoipa::path(
    put,
    path = "/admin/questions/{id}",
    tag = "questions",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the question")),
    request_body = QuestionInput,
    responses(
        (status = 200, description = "Question updated", body = QuestionSummary),
        (status = 409, description = "Question is currently asked")
    )
)]
pub async fn update_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<QuestionInput>>,
) -> Result<Json<QuestionSummary>, AppError> {
    Ok(Json(
        question_service::update_question(&state, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/admin/questions/{id}",
    tag = "questions",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the question")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 409, description = "Question is currently asked")
    )
)]
pub async fn delete_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    question_service::delete_question(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/statistics",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Aggregated statistics", body = StatisticsResponse))
)]
pub async fn statistics(
    State(state): State<SharedState>,
) -> Result<Json<StatisticsResponse>, AppError> {
    Ok(Json(stats_service::statistics(&state).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    if sse_service::verify_admin_token(&state, provided).await {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized(
            "admin token does not match the connected admin stream".into(),
        ))
    }
}
