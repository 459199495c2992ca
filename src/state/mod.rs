pub mod game;
pub mod registry;
mod sse;
pub mod state_machine;
pub mod transitions;

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::{
    sync::{Mutex, MutexGuard, RwLock, mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    error::ServiceError,
    services::{
        command_queue::{CommandQueue, GameCommand},
        sse_events,
    },
    state::{registry::SessionRegistry, state_machine::GamePhase},
};

pub use self::sse::{Audience, SseHub};
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::{
    sse::SseState,
    state_machine::{GameEvent, GameStateMachine},
};

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push private frames to a connected player.
pub struct PlayerConnection {
    /// Identifies this socket so a stale disconnect does not evict a newer one.
    pub connection_id: Uuid,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// What a background task scheduled on behalf of the active session is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledKind {
    /// Ticking `timer:update` until the answer window closes.
    RoundTimer,
    /// Waiting before the next round starts on its own.
    AutoAdvance,
}

struct ScheduledTask {
    kind: ScheduledKind,
    session_id: Uuid,
    round: u32,
    handle: JoinHandle<()>,
}

/// Central application state storing connections, the session registry and the storage handle.
pub struct AppState {
    config: Arc<AppConfig>,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    sse: SseState,
    players: DashMap<Uuid, PlayerConnection>,
    game: RwLock<GameStateMachine>,
    sessions: SessionRegistry,
    scheduled: Mutex<Option<ScheduledTask>>,
    commands: CommandQueue,
    command_inbox: StdMutex<Option<mpsc::UnboundedReceiver<GameCommand>>>,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    transition_timeout: Duration,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (commands, inbox) = CommandQueue::channel();
        let transition_timeout = config.store_timeout();
        Arc::new(Self {
            config: Arc::new(config),
            game_store: RwLock::new(None),
            sse: SseState::new(64, 64),
            players: DashMap::new(),
            game: RwLock::new(GameStateMachine::new()),
            sessions: SessionRegistry::new(),
            scheduled: Mutex::new(None),
            commands,
            command_inbox: StdMutex::new(Some(inbox)),
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
            transition_timeout,
        })
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current game store or fail with [`ServiceError::Degraded`].
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying both audiences when it changes.
    pub fn set_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            sse_events::broadcast_system_status(self, value);
        }
    }

    /// Broadcast hub serving `audience`.
    pub fn hub(&self, audience: Audience) -> &SseHub {
        self.sse.hub(audience)
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.hub(Audience::Public)
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.hub(Audience::Admin)
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin_token()
    }

    /// Registry of connected player sockets keyed by participant id.
    pub fn players(&self) -> &DashMap<Uuid, PlayerConnection> {
        &self.players
    }

    /// In-memory sessions and the active pointer.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Handle to the single-writer command queue.
    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// Hand the queue receiver to the worker; only the first caller gets it.
    pub fn take_command_inbox(&self) -> Option<mpsc::UnboundedReceiver<GameCommand>> {
        self.command_inbox
            .lock()
            .ok()
            .and_then(|mut inbox| inbox.take())
    }

    /// Snapshot the current phase of the shared game state machine.
    pub async fn state_machine_phase(&self) -> GamePhase {
        self.game.read().await.phase()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.game.read().await;
        sm.snapshot()
    }

    /// Hold the transition gate, excluding state-machine transitions for the guard's lifetime.
    pub async fn lock_transitions(&self) -> MutexGuard<'_, ()> {
        self.transition_gate.lock().await
    }

    /// Run a persistence step bounded by the transition timeout.
    pub async fn bounded<Fut, T>(&self, work: Fut) -> Result<T, ServiceError>
    where
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        timeout(self.transition_timeout, work)
            .await
            .map_err(|_| ServiceError::Timeout)?
    }

    /// Replace the scheduled background task, aborting the previous one.
    pub async fn schedule(
        &self,
        kind: ScheduledKind,
        session_id: Uuid,
        round: u32,
        handle: JoinHandle<()>,
    ) {
        let mut slot = self.scheduled.lock().await;
        if let Some(previous) = slot.replace(ScheduledTask {
            kind,
            session_id,
            round,
            handle,
        }) {
            debug!(
                kind = ?previous.kind,
                session_id = %previous.session_id,
                round = previous.round,
                "replacing scheduled task"
            );
            previous.handle.abort();
        }
    }

    /// Abort the scheduled background task, if any.
    pub async fn cancel_scheduled(&self) {
        let mut slot = self.scheduled.lock().await;
        if let Some(task) = slot.take() {
            debug!(
                kind = ?task.kind,
                session_id = %task.session_id,
                round = task.round,
                "cancelling scheduled task"
            );
            task.handle.abort();
        }
    }

    /// Kind of the scheduled task still running, if any.
    pub async fn scheduled_kind(&self) -> Option<ScheduledKind> {
        let slot = self.scheduled.lock().await;
        slot.as_ref()
            .filter(|task| !task.handle.is_finished())
            .map(|task| task.kind)
    }

    /// Plan a transition to the shared game state machine, returning the plan.
    async fn plan_transition(&self, event: GameEvent) -> Result<Plan, PlanError> {
        let mut sm = self.game.write().await;
        sm.plan(event)
    }

    /// Apply the planned transition to the shared game state machine, returning the next phase.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<GamePhase, ApplyError> {
        let mut sm = self.game.write().await;
        sm.apply(plan_id)
    }

    /// Abort a planned transition of the shared game state machine
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.game.write().await;
        sm.abort(plan_id)
    }

    /// Plan `event`, run `work` under the transition timeout, then apply or abort the plan.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: GameEvent,
        work: F,
    ) -> Result<(T, GamePhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        match self.bounded(work()).await {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::RoundPhase;

    #[tokio::test]
    async fn failed_work_leaves_phase_untouched() {
        let state = AppState::new(AppConfig::default());
        let result: Result<((), GamePhase), ServiceError> = state
            .run_transition(GameEvent::StartGame, || async { Err(ServiceError::Degraded) })
            .await;

        assert!(matches!(result, Err(ServiceError::Degraded)));
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.phase, GamePhase::Idle);
        assert_eq!(snapshot.pending, None);
    }

    #[tokio::test]
    async fn successful_work_applies_the_plan() {
        let state = AppState::new(AppConfig::default());
        let (value, next) = state
            .run_transition(GameEvent::StartGame, || async { Ok(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(
            next,
            GamePhase::Active {
                round: 1,
                status: RoundPhase::Waiting
            }
        );
    }

    #[tokio::test]
    async fn invalid_transition_is_a_conflict() {
        let state = AppState::new(AppConfig::default());
        let result = state
            .run_transition(GameEvent::EndRound, || async { Ok(()) })
            .await;
        assert!(matches!(result, Err(ServiceError::ConflictingSession(_))));
    }

    #[tokio::test]
    async fn degraded_flag_follows_store_installation() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        let mut events = state.public_sse().subscribe();

        state
            .install_game_store(Arc::new(crate::dao::game_store::MemoryGameStore::new()))
            .await;

        assert!(!state.is_degraded());
        let event = events.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("system.status"));
    }

    #[tokio::test]
    async fn scheduling_aborts_the_previous_task() {
        let state = AppState::new(AppConfig::default());
        let session_id = Uuid::new_v4();
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let first = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await
        });
        state
            .schedule(ScheduledKind::RoundTimer, session_id, 1, first)
            .await;
        state
            .schedule(
                ScheduledKind::AutoAdvance,
                session_id,
                2,
                tokio::spawn(std::future::pending::<()>()),
            )
            .await;

        assert!(alive_rx.await.is_err());
        assert_eq!(state.scheduled_kind().await, Some(ScheduledKind::AutoAdvance));

        state.cancel_scheduled().await;
        assert_eq!(state.scheduled_kind().await, None);
    }
}
