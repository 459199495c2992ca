use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent, SystemBroadcast},
    error::ServiceError,
    services::sse_events,
    state::{Audience, SharedState},
};

/// Subscribe to the shared public SSE stream.
pub fn subscribe_public(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.public_sse().subscribe()
}

/// Subscribe to the admin-only SSE stream, claiming the admin token.
pub async fn subscribe_admin(
    state: &SharedState,
) -> Result<(broadcast::Receiver<ServerEvent>, String), ServiceError> {
    let token = claim_admin_token(state).await?;
    let receiver = state.admin_sse().subscribe();
    Ok((receiver, token))
}

/// Whether `candidate` matches the token held by the connected admin stream.
pub async fn verify_admin_token(state: &SharedState, candidate: &str) -> bool {
    let guard = state.admin_token().lock().await;
    guard.as_deref().is_some_and(|token| token == candidate)
}

/// Interval between keep-alive comments on idle streams.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Which hub a stream reads from; admin streams release the token on teardown.
#[derive(Clone)]
pub enum StreamKind {
    Public,
    Admin(SharedState),
}

impl StreamKind {
    async fn disconnected(self) {
        match self {
            StreamKind::Public => info!("public SSE stream disconnected"),
            StreamKind::Admin(state) => {
                reset_admin_token(state).await;
                info!("admin SSE stream disconnected; token released");
            }
        }
    }
}

/// Open the public stream and greet it with a handshake.
pub fn open_public_stream(
    state: &SharedState,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let receiver = subscribe_public(state);
    info!("public SSE stream connected");
    broadcast_public_handshake(state);
    to_sse_stream(receiver, StreamKind::Public)
}

/// Claim the admin token and open the admin stream; its first event carries the token.
pub async fn open_admin_stream(
    state: &SharedState,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ServiceError> {
    let (receiver, token) = subscribe_admin(state).await?;
    info!("admin SSE stream connected");
    broadcast_admin_token(state, &token);
    Ok(to_sse_stream(receiver, StreamKind::Admin(state.clone())))
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Forward hub events into an SSE response until the client goes away.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            let payload = tokio::select! {
                _ = tx.closed() => break,
                received = receiver.recv() => match received {
                    Ok(payload) => payload,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "SSE subscriber lagged; dropping missed events");
                        continue;
                    }
                },
            };
            if tx.send(Ok(to_event(payload))).await.is_err() {
                break;
            }
        }
        kind.disconnected().await;
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// Reserve the admin token for a new stream, failing if another connection already holds it.
async fn claim_admin_token(state: &SharedState) -> Result<String, ServiceError> {
    let mut guard = state.admin_token().lock().await;
    match &mut *guard {
        slot @ None => {
            let token = Uuid::new_v4().simple().to_string();
            slot.replace(token.clone());
            Ok(token)
        }
        Some(_) => Err(ServiceError::Unauthorized(
            "Another admin SSE stream is already active".into(),
        )),
    }
}

/// Greet newly connected public subscribers.
pub fn broadcast_public_handshake(state: &SharedState) {
    let handshake = Handshake {
        stream: "public".into(),
        message: "public stream connected".into(),
        degraded: state.is_degraded(),
        token: None,
    };
    sse_events::send_system(
        state,
        &[Audience::Public],
        &SystemBroadcast::Handshake(handshake),
    );
}

/// Hand the freshly claimed token to the admin stream.
pub fn broadcast_admin_token(state: &SharedState, token: &str) {
    let handshake = Handshake {
        stream: "admin".into(),
        message: "admin stream connected".into(),
        degraded: state.is_degraded(),
        token: Some(token.to_string()),
    };
    sse_events::send_system(
        state,
        &[Audience::Admin],
        &SystemBroadcast::AdminToken(handshake),
    );
}

/// Clear the stored admin token so the next admin connection negotiates a fresh credential.
async fn reset_admin_token(state: SharedState) {
    let mut guard = state.admin_token().lock().await;
    guard.take();
}
