//! Single-writer command queue serialising every session mutation.
//!
//! HTTP handlers, player sockets and timers enqueue commands; one worker task drains them in
//! arrival order, so two commands never mutate a session concurrently.

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::game::{AnswerReceipt, StartGameRequest, SubmitAnswerRequest},
    error::ServiceError,
    services::game_service,
    state::{SharedState, game::GameSession},
};

/// Channel used by the worker to answer the issuer of a command.
pub type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

/// Mutation of the active session, processed one at a time.
pub enum GameCommand {
    Start {
        request: StartGameRequest,
        reply: Reply<GameSession>,
    },
    StartRound {
        session_id: Uuid,
        round: u32,
        reply: Reply<GameSession>,
    },
    SubmitAnswer {
        request: SubmitAnswerRequest,
        reply: Reply<AnswerReceipt>,
    },
    ForceEndRound {
        session_id: Uuid,
        reply: Reply<GameSession>,
    },
    ForceEndGame {
        session_id: Uuid,
        reply: Reply<GameSession>,
    },
    /// Raised by the round timer once the answer window elapsed.
    RoundTimerExpired { session_id: Uuid, round: u32 },
    /// Raised after the configured pause between rounds.
    AutoAdvance { session_id: Uuid, round: u32 },
}

impl GameCommand {
    fn label(&self) -> &'static str {
        match self {
            GameCommand::Start { .. } => "start_game",
            GameCommand::StartRound { .. } => "start_round",
            GameCommand::SubmitAnswer { .. } => "submit_answer",
            GameCommand::ForceEndRound { .. } => "force_end_round",
            GameCommand::ForceEndGame { .. } => "force_end_game",
            GameCommand::RoundTimerExpired { .. } => "round_timer_expired",
            GameCommand::AutoAdvance { .. } => "auto_advance",
        }
    }
}

/// Cloneable handle used to submit commands to the worker.
#[derive(Clone)]
pub struct CommandQueue {
    sender: mpsc::UnboundedSender<GameCommand>,
}

impl CommandQueue {
    /// Create the queue together with the receiver the worker will drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GameCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Push a command without waiting for its outcome.
    pub fn enqueue(&self, command: GameCommand) -> Result<(), ServiceError> {
        self.sender
            .send(command)
            .map_err(|_| ServiceError::Shutdown)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> GameCommand,
    ) -> Result<T, ServiceError> {
        let (reply, outcome) = oneshot::channel();
        self.enqueue(build(reply))?;
        outcome.await.map_err(|_| ServiceError::Shutdown)?
    }

    pub async fn start(&self, request: StartGameRequest) -> Result<GameSession, ServiceError> {
        self.request(|reply| GameCommand::Start { request, reply })
            .await
    }

    pub async fn start_round(
        &self,
        session_id: Uuid,
        round: u32,
    ) -> Result<GameSession, ServiceError> {
        self.request(|reply| GameCommand::StartRound {
            session_id,
            round,
            reply,
        })
        .await
    }

    pub async fn submit_answer(
        &self,
        request: SubmitAnswerRequest,
    ) -> Result<AnswerReceipt, ServiceError> {
        self.request(|reply| GameCommand::SubmitAnswer { request, reply })
            .await
    }

    pub async fn force_end_round(&self, session_id: Uuid) -> Result<GameSession, ServiceError> {
        self.request(|reply| GameCommand::ForceEndRound { session_id, reply })
            .await
    }

    pub async fn force_end_game(&self, session_id: Uuid) -> Result<GameSession, ServiceError> {
        self.request(|reply| GameCommand::ForceEndGame { session_id, reply })
            .await
    }
}

/// Start the worker draining the queue; returns `None` if a worker already runs.
pub fn spawn_worker(state: SharedState) -> Option<JoinHandle<()>> {
    let mut inbox = state.take_command_inbox()?;
    Some(tokio::spawn(async move {
        info!("game command worker started");
        while let Some(command) = inbox.recv().await {
            dispatch(&state, command).await;
        }
        info!("game command worker stopped");
    }))
}

async fn dispatch(state: &SharedState, command: GameCommand) {
    let label = command.label();
    debug!(command = label, "processing game command");
    match command {
        GameCommand::Start { request, reply } => {
            let result = game_service::start_game(state, request).await;
            respond(label, reply, result);
        }
        GameCommand::StartRound {
            session_id,
            round,
            reply,
        } => {
            let result = game_service::start_round(state, session_id, round).await;
            respond(label, reply, result);
        }
        GameCommand::SubmitAnswer { request, reply } => {
            let result = game_service::submit_answer(state, request).await;
            respond(label, reply, result);
        }
        GameCommand::ForceEndRound { session_id, reply } => {
            let result = game_service::force_end_round(state, session_id).await;
            respond(label, reply, result);
        }
        GameCommand::ForceEndGame { session_id, reply } => {
            let result = game_service::force_end_game(state, session_id).await;
            respond(label, reply, result);
        }
        GameCommand::RoundTimerExpired { session_id, round } => {
            if let Err(err) = game_service::on_round_timer_expired(state, session_id, round).await {
                log_failure(label, &err);
            }
        }
        GameCommand::AutoAdvance { session_id, round } => {
            if let Err(err) = game_service::on_auto_advance(state, session_id, round).await {
                log_failure(label, &err);
            }
        }
    }
}

fn respond<T>(label: &'static str, reply: Reply<T>, result: Result<T, ServiceError>) {
    if let Err(err) = &result {
        log_failure(label, err);
    }
    if reply.send(result).is_err() {
        debug!(command = label, "command issuer went away before the reply");
    }
}

fn log_failure(label: &'static str, err: &ServiceError) {
    if err.is_persistence_failure() {
        warn!(command = label, error = %err, "game command failed to persist");
    } else {
        debug!(command = label, error = %err, "game command rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_queue_reports_shutdown() {
        let (queue, inbox) = CommandQueue::channel();
        drop(inbox);

        let result = queue.force_end_round(Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::Shutdown)));
    }

    #[tokio::test]
    async fn dropped_reply_reports_shutdown() {
        let (queue, mut inbox) = CommandQueue::channel();
        let pending = tokio::spawn(async move { queue.force_end_game(Uuid::new_v4()).await });

        // Receive and drop the command without answering.
        drop(inbox.recv().await);

        assert!(matches!(
            pending.await.unwrap(),
            Err(ServiceError::Shutdown)
        ));
    }
}
