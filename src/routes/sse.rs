use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;

use crate::{error::AppError, services::sse_service, state::SharedState};

/// Server-sent event streams for the admin console and public displays.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sse/public", get(public_stream))
        .route("/sse/admin", get(admin_stream))
}

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((status = 200, description = "Public SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream gameplay events to displays.
pub async fn public_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_service::open_public_stream(&state)
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    responses(
        (status = 200, description = "Admin SSE stream; the first `admin_token` event carries the token for `X-Admin-Token`", content_type = "text/event-stream", body = String),
        (status = 401, description = "Another admin stream is connected")
    )
)]
/// Stream operator events; fails while another admin stream holds the token.
pub async fn admin_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    Ok(sse_service::open_admin_stream(&state).await?)
}
