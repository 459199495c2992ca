use tokio::sync::{Mutex, broadcast};

use crate::dto::sse::ServerEvent;

/// Logical recipient class of a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// The single privileged admin stream.
    Admin,
    /// Player displays and every other public subscriber.
    Public,
}

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    public: SseHub,
    admin: AdminSseState,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(public_capacity: usize, admin_capacity: usize) -> Self {
        Self {
            public: SseHub::new(public_capacity),
            admin: AdminSseState::new(admin_capacity),
        }
    }

    /// Hub serving the given audience.
    pub fn hub(&self, audience: Audience) -> &SseHub {
        match audience {
            Audience::Admin => &self.admin.hub,
            Audience::Public => &self.public,
        }
    }

    /// Token mutex that coordinates the single admin connection.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        &self.admin.token
    }
}

/// State bundle holding the admin SSE hub and its coordinating token.
struct AdminSseState {
    hub: SseHub,
    token: Mutex<Option<String>>,
}

impl AdminSseState {
    fn new(capacity: usize) -> Self {
        Self {
            hub: SseHub::new(capacity),
            token: Mutex::new(None),
        }
    }
}

/// Fan-out hub backed by a Tokio broadcast channel; delivery is at-most-once per subscriber.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers; events sent with nobody listening are dropped.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
