use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Aggregate over every finished session a participant played.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct ParticipantStatistics {
    pub participant_id: Uuid,
    /// Name recorded in the most recent session.
    pub name: String,
    pub games_played: u32,
    pub total_score: u64,
    pub average_score: f64,
    /// Best final rank reached, 1 being the winner.
    pub best_placement: u8,
    pub wins: u32,
}

/// Wall-clock length of finished sessions, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema, PartialEq, Eq)]
pub struct DurationStatistics {
    pub min_ms: u64,
    pub max_ms: u64,
    pub average_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema, PartialEq)]
pub struct GlobalStatistics {
    pub sessions: u32,
    pub average_winning_score: f64,
    pub highest_score: u32,
    pub duration: DurationStatistics,
}

/// Statistics recomputed from the archived sessions.
#[derive(Debug, Clone, Default, Serialize, ToSchema, PartialEq)]
pub struct StatisticsResponse {
    pub global: GlobalStatistics,
    /// Ordered by first appearance.
    pub participants: Vec<ParticipantStatistics>,
}
