use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        game::SubmitAnswerRequest,
        ws::{PlayerInboundMessage, PlayerOutboundMessage},
    },
    error::ServiceError,
    services::{game_service, participant_service},
    state::{Audience, PlayerConnection, SharedState},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure while serving an identified player socket.
#[derive(Debug, Error)]
enum PlayerSocketError {
    /// Writer channel closed; the connection is gone.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle the full lifecycle of one player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing while we await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let participant_id = match serde_json::from_str::<PlayerInboundMessage>(&initial_message)
        .ok()
        .and_then(|message| message.identification_id())
    {
        Some(id) => id,
        None => {
            warn!("first player frame was not a valid identification");
            let _ = send_frame(
                &outbound_tx,
                &PlayerOutboundMessage::Error {
                    message: "first frame must be an identification".into(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    if let Err(err) = participant_service::get(&state, participant_id).await {
        warn!(%participant_id, error = %err, "refusing player identification");
        let _ = send_frame(
            &outbound_tx,
            &PlayerOutboundMessage::Error {
                message: err.to_string(),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let connection_id = Uuid::new_v4();
    let previous = state.players().insert(
        participant_id,
        PlayerConnection {
            connection_id,
            tx: outbound_tx.clone(),
        },
    );
    if let Some(previous) = previous {
        info!(%participant_id, "replacing previous player connection");
        let _ = previous.tx.send(Message::Close(None));
    }
    info!(%participant_id, "player connected");

    let forwarder = spawn_public_forwarder(&state, outbound_tx.clone());

    if send_frame(
        &outbound_tx,
        &PlayerOutboundMessage::Identified { participant_id },
    )
    .is_ok()
    {
        serve_player(&state, participant_id, &mut receiver, &outbound_tx).await;
    }

    forwarder.abort();
    state
        .players()
        .remove_if(&participant_id, |_, conn| conn.connection_id == connection_id);
    info!(%participant_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

async fn serve_player(
    state: &SharedState,
    participant_id: Uuid,
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(%participant_id, payload = %text, "received player frame");
                let reply = match serde_json::from_str::<PlayerInboundMessage>(&text) {
                    Ok(frame) => handle_frame(state, participant_id, frame).await,
                    Err(err) => {
                        warn!(%participant_id, error = %err, "failed to parse player frame");
                        Some(PlayerOutboundMessage::Error {
                            message: format!("malformed frame: {err}"),
                        })
                    }
                };
                if let Some(reply) = reply {
                    if send_frame(outbound_tx, &reply).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%participant_id, error = %err, "websocket error");
                break;
            }
        }
    }
}

/// Turn one inbound frame into the private reply owed to the sender, if any.
async fn handle_frame(
    state: &SharedState,
    participant_id: Uuid,
    frame: PlayerInboundMessage,
) -> Option<PlayerOutboundMessage> {
    match frame {
        PlayerInboundMessage::Answer {
            question_id,
            answer,
        } => {
            let request = SubmitAnswerRequest {
                participant_id,
                question_id,
                answer,
            };
            Some(match state.commands().submit_answer(request).await {
                Ok(receipt) => PlayerOutboundMessage::AnswerAccepted { receipt },
                Err(ServiceError::AnswerRejected(reason)) => {
                    PlayerOutboundMessage::AnswerRejected {
                        question_id,
                        reason,
                    }
                }
                Err(err) => PlayerOutboundMessage::Error {
                    message: err.to_string(),
                },
            })
        }
        PlayerInboundMessage::RequestState { session_id } => {
            let snapshot = match session_id {
                Some(id) => game_service::request_state(state, id, Audience::Public).await,
                None => game_service::active_state(state, Audience::Public).await,
            };
            Some(match snapshot {
                Ok(snapshot) => PlayerOutboundMessage::State { snapshot },
                Err(err) => PlayerOutboundMessage::Error {
                    message: err.to_string(),
                },
            })
        }
        PlayerInboundMessage::Identification { .. } => {
            warn!(%participant_id, "ignoring duplicate identification frame");
            None
        }
        PlayerInboundMessage::Unknown => Some(PlayerOutboundMessage::Error {
            message: "unsupported frame type".into(),
        }),
    }
}

/// Relay every public broadcast to the socket as a text frame.
fn spawn_public_forwarder(
    state: &SharedState,
    outbound_tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let mut events = state.public_sse().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if outbound_tx.send(Message::Text(event.data.into())).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "player socket lagged; dropping missed events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Serialize a frame and queue it on the writer channel.
///
/// A serialization failure is logged and swallowed; only a closed writer is an error.
fn send_frame<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> Result<(), PlayerSocketError>
where
    T: Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize frame `{value:?}`");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into()))
        .map_err(|_| PlayerSocketError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
