use std::time::SystemTime;

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, sleep_until},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::models::RoundStatus,
    services::{
        command_queue::GameCommand,
        sse_events::broadcast_timer_update,
    },
    state::SharedState,
};

/// Spawn the countdown of `round`: ticks `timer:update` until `ends_at`, then asks the worker
/// to close the round.
///
/// The returned handle must be registered with [`AppState::schedule`](crate::state::AppState::schedule)
/// so ending the round aborts it.
pub fn spawn(state: SharedState, session_id: Uuid, round: u32, ends_at: SystemTime) -> JoinHandle<()> {
    let tick = state.config().timer_tick();
    tokio::spawn(async move {
        let remaining = ends_at
            .duration_since(SystemTime::now())
            .unwrap_or_default();
        let deadline = Instant::now() + remaining;
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(%session_id, round, remaining_ms = remaining.as_millis() as u64, "round timer started");

        loop {
            tokio::select! {
                biased;
                _ = sleep_until(deadline) => break,
                _ = ticker.tick() => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        break;
                    }
                    if !round_is_running(&state, session_id, round) {
                        debug!(%session_id, round, "round no longer running; stopping timer");
                        return;
                    }
                    broadcast_timer_update(&state, session_id, round, left);
                }
            }
        }

        debug!(%session_id, round, "round timer expired");
        if state
            .commands()
            .enqueue(GameCommand::RoundTimerExpired { session_id, round })
            .is_err()
        {
            debug!(%session_id, round, "command queue closed; dropping timer expiry");
        }
    })
}

fn round_is_running(state: &SharedState, session_id: Uuid, round: u32) -> bool {
    state.sessions().get(session_id).is_some_and(|session| {
        session.current_round == round && session.round_status == RoundStatus::Active
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, MemoryGameStore},
            models::AnswerChoice,
        },
        dto::game::StartGameRequest,
        services::command_queue,
        state::{
            AppState,
            game::tests::{participant, question},
        },
    };

    #[tokio::test]
    async fn ticks_until_expiry_then_closes_the_round_and_goes_quiet() {
        let state = AppState::new(
            AppConfig::from_json(
                r#"{ "total_rounds": 2, "question_duration_ms": 400, "timer_tick_ms": 50 }"#,
            )
            .unwrap(),
        );
        let store = MemoryGameStore::new();
        let mut participant_ids = Vec::new();
        for name in ["Ana", "Bia", "Caio"] {
            let entity = participant(name);
            participant_ids.push(entity.id);
            store.save_participant(entity).await.unwrap();
        }
        store.save_question(question(AnswerChoice::B)).await.unwrap();
        state.install_game_store(Arc::new(store)).await;
        let worker = command_queue::spawn_worker(state.clone()).unwrap();
        let mut events = state.public_sse().subscribe();

        let queue = state.commands().clone();
        let session = queue
            .start(StartGameRequest {
                participant_ids,
                theme_id: None,
                total_rounds: None,
            })
            .await
            .unwrap();
        queue.start_round(session.id, 1).await.unwrap();

        let mut ticks = Vec::new();
        let ended = timeout(Duration::from_secs(3), async {
            loop {
                let event = events.recv().await.unwrap();
                let value: serde_json::Value = serde_json::from_str(&event.data).unwrap();
                match event.event.as_deref() {
                    Some("timer:update") => {
                        ticks.push(value["data"]["time_remaining_ms"].as_u64().unwrap())
                    }
                    Some("round:ended") => return value,
                    _ => {}
                }
            }
        })
        .await
        .unwrap();

        assert!(ticks.len() >= 2, "expected periodic ticks, got {ticks:?}");
        assert!(ticks.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(ended["data"]["reason"], "timer");
        assert_eq!(
            state.sessions().get(session.id).unwrap().round_status,
            RoundStatus::Finished
        );

        let quiet = timeout(Duration::from_millis(200), async {
            loop {
                let event = events.recv().await.unwrap();
                if event.event.as_deref() == Some("timer:update") {
                    return event;
                }
            }
        })
        .await;
        assert!(quiet.is_err(), "timer kept ticking after the round ended");
        assert_eq!(state.scheduled_kind().await, None);

        worker.abort();
    }
}
