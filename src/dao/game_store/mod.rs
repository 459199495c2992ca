pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    ClaimOutcome, GameSessionEntity, Page, PageRequest, ParticipantEntity, ParticipantStatus,
    QuestionEntity, QuestionFilter, QuestionQuery, SessionStatus, ThemeEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryGameStore;

/// Abstraction over the persistence layer for participants, the question bank and sessions.
pub trait GameStore: Send + Sync {
    fn save_participant(&self, participant: ParticipantEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    fn delete_participant(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_participants(
        &self,
        status: Option<ParticipantStatus>,
        page: PageRequest,
    ) -> BoxFuture<'static, StorageResult<Page<ParticipantEntity>>>;
    /// Flip every listed participant from `waiting` to `playing`, or change nothing.
    fn claim_participants(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<ClaimOutcome>>;
    /// Set the status of every listed participant, ignoring unknown identifiers.
    fn release_participants(
        &self,
        ids: Vec<Uuid>,
        status: ParticipantStatus,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn save_theme(&self, theme: ThemeEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_theme(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ThemeEntity>>>;
    fn delete_theme(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_themes(&self) -> BoxFuture<'static, StorageResult<Vec<ThemeEntity>>>;

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    fn delete_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_questions(
        &self,
        filter: QuestionFilter,
        page: PageRequest,
    ) -> BoxFuture<'static, StorageResult<Page<QuestionEntity>>>;
    /// Draw one eligible question at random.
    fn next_question(
        &self,
        query: QuestionQuery,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;

    fn save_session(&self, session: GameSessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_session(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    fn list_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
