//! Score aggregator: read-side statistics over finished sessions.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::SessionStatus,
    dto::{
        millis,
        stats::{DurationStatistics, GlobalStatistics, ParticipantStatistics, StatisticsResponse},
    },
    error::ServiceError,
    state::{SharedState, game::GameSession},
};

/// Load every finished session and aggregate it.
pub async fn statistics(state: &SharedState) -> Result<StatisticsResponse, ServiceError> {
    let store = state.require_game_store().await?;
    let sessions = store
        .list_sessions(Some(SessionStatus::Finished))
        .await?
        .into_iter()
        .map(GameSession::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(aggregate(&sessions))
}

/// Pure aggregation; sessions that are not finished are ignored.
pub fn aggregate(sessions: &[GameSession]) -> StatisticsResponse {
    let finished: Vec<&GameSession> = sessions
        .iter()
        .filter(|session| session.status == SessionStatus::Finished)
        .collect();

    let mut participants: IndexMap<Uuid, ParticipantStatistics> = IndexMap::new();
    let mut winning_scores: Vec<u32> = Vec::new();
    let mut highest_score = 0;

    for session in &finished {
        let standings = session.standings();
        if let Some(winner) = standings.first() {
            winning_scores.push(winner.score);
        }
        for (rank, seat) in standings.into_iter().enumerate() {
            let placement = u8::try_from(rank + 1).unwrap_or(u8::MAX);
            highest_score = highest_score.max(seat.score);

            let entry = participants
                .entry(seat.participant_id)
                .or_insert_with(|| ParticipantStatistics {
                    participant_id: seat.participant_id,
                    name: seat.name.clone(),
                    games_played: 0,
                    total_score: 0,
                    average_score: 0.0,
                    best_placement: placement,
                    wins: 0,
                });
            entry.name = seat.name.clone();
            entry.games_played += 1;
            entry.total_score += u64::from(seat.score);
            entry.best_placement = entry.best_placement.min(placement);
            if placement == 1 {
                entry.wins += 1;
            }
        }
    }

    for entry in participants.values_mut() {
        entry.average_score = entry.total_score as f64 / f64::from(entry.games_played);
    }

    let average_winning_score = if winning_scores.is_empty() {
        0.0
    } else {
        winning_scores.iter().map(|score| f64::from(*score)).sum::<f64>()
            / winning_scores.len() as f64
    };

    StatisticsResponse {
        global: GlobalStatistics {
            sessions: u32::try_from(finished.len()).unwrap_or(u32::MAX),
            average_winning_score,
            highest_score,
            duration: duration_statistics(&finished),
        },
        participants: participants.into_values().collect(),
    }
}

fn duration_statistics(sessions: &[&GameSession]) -> DurationStatistics {
    let durations: Vec<u64> = sessions
        .iter()
        .filter_map(|session| session.duration())
        .map(millis)
        .collect();
    if durations.is_empty() {
        return DurationStatistics::default();
    }
    let total: u64 = durations.iter().sum();
    DurationStatistics {
        min_ms: durations.iter().copied().min().unwrap_or_default(),
        max_ms: durations.iter().copied().max().unwrap_or_default(),
        average_ms: total / durations.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::{dao::models::ParticipantEntity, state::game::tests::participant};

    fn finished(seats: &[&ParticipantEntity], scores: [u32; 3], length: Duration) -> GameSession {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut session = GameSession::new(
            seats.iter().map(|seat| (*seat).clone()).collect(),
            None,
            3,
            start,
        )
        .unwrap();
        for (seat, score) in session.participants.iter_mut().zip(scores) {
            seat.score = score;
        }
        session.finish(start + length);
        session
    }

    #[test]
    fn empty_input_yields_zeroed_statistics() {
        assert_eq!(aggregate(&[]), StatisticsResponse::default());
    }

    #[test]
    fn aggregates_per_participant_and_globally() {
        let ana = participant("Ana");
        let bia = participant("Bia");
        let caio = participant("Caio");
        let duda = participant("Duda");

        let sessions = vec![
            finished(&[&ana, &bia, &caio], [30, 10, 30], Duration::from_secs(60)),
            finished(&[&duda, &caio, &ana], [0, 40, 20], Duration::from_secs(120)),
        ];

        let stats = aggregate(&sessions);

        let ids: Vec<Uuid> = stats.participants.iter().map(|p| p.participant_id).collect();
        assert_eq!(ids, vec![ana.id, caio.id, bia.id, duda.id]);

        let ana_stats = &stats.participants[0];
        assert_eq!(ana_stats.games_played, 2);
        assert_eq!(ana_stats.total_score, 50);
        assert_eq!(ana_stats.average_score, 25.0);
        assert_eq!(ana_stats.best_placement, 1);
        assert_eq!(ana_stats.wins, 1);

        // Caio tied Ana in the first game from a later seat, then won the second.
        let caio_stats = &stats.participants[1];
        assert_eq!(caio_stats.wins, 1);
        assert_eq!(caio_stats.best_placement, 1);

        assert_eq!(stats.participants[3].best_placement, 3);

        assert_eq!(stats.global.sessions, 2);
        assert_eq!(stats.global.highest_score, 40);
        assert_eq!(stats.global.average_winning_score, 35.0);
        assert_eq!(
            stats.global.duration,
            DurationStatistics {
                min_ms: 60_000,
                max_ms: 120_000,
                average_ms: 90_000,
            }
        );
    }

    #[test]
    fn running_sessions_are_ignored() {
        let running = GameSession::new(
            vec![participant("A"), participant("B"), participant("C")],
            None,
            3,
            SystemTime::now(),
        )
        .unwrap();
        assert_eq!(aggregate(&[running]), StatisticsResponse::default());
    }
}
