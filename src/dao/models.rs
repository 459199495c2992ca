use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Availability of a registered participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Registered and available for selection.
    Waiting,
    /// Currently seated in a running session.
    Playing,
    /// Has played and is no longer eligible for selection.
    Retired,
}

impl ParticipantStatus {
    /// Wire representation, also used as the stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Waiting => "waiting",
            ParticipantStatus::Playing => "playing",
            ParticipantStatus::Retired => "retired",
        }
    }
}

/// Difficulty grade of a question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Wire representation, also used as the stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// One of the three options of a question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum AnswerChoice {
    A,
    B,
    C,
}

/// Lifecycle status of a game session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Finished,
}

impl SessionStatus {
    /// Wire representation, also used as the stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
        }
    }
}

/// Status of the current round inside an active session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Waiting,
    Active,
    Finished,
}

/// Registered contestant, owned by the participant registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub state: String,
    pub photo_url: Option<String>,
    pub status: ParticipantStatus,
    pub created_at: SystemTime,
}

/// Theme grouping questions of the bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: SystemTime,
}

/// Question stored in the bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    pub id: Uuid,
    pub theme_id: Option<Uuid>,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub correct_answer: AnswerChoice,
    pub difficulty: Difficulty,
    pub created_at: SystemTime,
}

/// Question as it was asked during a given round of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameQuestionEntity {
    pub id: Uuid,
    pub theme_id: Option<Uuid>,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub correct_answer: AnswerChoice,
    pub difficulty: Difficulty,
    pub round_number: u32,
}

/// Seat of a participant inside a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameParticipantEntity {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub name: String,
    pub score: u32,
    pub position: u8,
    pub joined_at: SystemTime,
    pub left_at: Option<SystemTime>,
}

/// Answer recorded for a participant on a given question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    pub participant_id: Uuid,
    pub question_id: Uuid,
    pub round: u32,
    pub answer: AnswerChoice,
    pub correct: bool,
    pub points: u32,
    pub answered_at: SystemTime,
}

/// Aggregate game session persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSessionEntity {
    pub id: Uuid,
    pub status: SessionStatus,
    pub theme_id: Option<Uuid>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub participants: Vec<GameParticipantEntity>,
    pub round_status: RoundStatus,
    pub current_question: Option<GameQuestionEntity>,
    pub round_start_time: Option<SystemTime>,
    pub round_end_time: Option<SystemTime>,
    pub asked_question_ids: Vec<Uuid>,
    pub answers: Vec<AnswerEntity>,
    pub winner_id: Option<Uuid>,
}

/// 1-based page request shared by the paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Largest page size a listing may return.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build a page request, clamping out-of-range values.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// Number of items to skip before this page starts.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of a listing together with the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Filter applied when listing questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub theme_id: Option<Uuid>,
    pub difficulty: Option<Difficulty>,
}

/// Selection criteria used to draw the next question of a round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionQuery {
    pub theme_id: Option<Uuid>,
    pub difficulty: Option<Difficulty>,
    pub excluding: Vec<Uuid>,
}

impl QuestionQuery {
    /// Whether `question` satisfies this query.
    pub fn matches(&self, question: &QuestionEntity) -> bool {
        self.theme_id.is_none_or(|theme| question.theme_id == Some(theme))
            && self
                .difficulty
                .is_none_or(|difficulty| question.difficulty == difficulty)
            && !self.excluding.contains(&question.id)
    }
}

/// Result of atomically claiming participants for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Every participant was waiting and is now playing (returned in request order).
    Claimed(Vec<ParticipantEntity>),
    /// Nothing changed; lists the offending identifiers.
    Rejected {
        unknown: Vec<Uuid>,
        unavailable: Vec<Uuid>,
    },
}
