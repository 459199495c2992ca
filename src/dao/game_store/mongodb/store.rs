use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc},
    options::IndexOptions,
};
use rand::seq::IndexedRandom;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::{self, connect},
    error::{Access, MongoDaoError, MongoResult},
    models::{MongoDocument, MongoQuestionDocument},
};
use crate::dao::{
    game_store::GameStore,
    models::{
        ClaimOutcome, GameSessionEntity, Page, PageRequest, ParticipantEntity, ParticipantStatus,
        QuestionEntity, QuestionFilter, QuestionQuery, SessionStatus, ThemeEntity,
    },
    storage::StorageResult,
};

const PARTICIPANT_COLLECTION_NAME: &str = "participants";
const THEME_COLLECTION_NAME: &str = "themes";
const QUESTION_COLLECTION_NAME: &str = "questions";
const SESSION_COLLECTION_NAME: &str = "sessions";

#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive alongside the database handle it produced.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        connection::ping(&database)
            .await
            .map_err(|source| MongoDaoError::Unreachable {
                attempts: 1,
                source,
            })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = connect(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn key_filter(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

fn keys_filter(ids: &[Uuid]) -> Document {
    let keys: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    doc! { "_id": { "$in": keys } }
}

fn write_error(collection: &'static str) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    move |source| MongoDaoError::Query {
        collection,
        access: Access::Write,
        source,
    }
}

fn read_error(collection: &'static str) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    move |source| MongoDaoError::Query {
        collection,
        access: Access::Read,
        source,
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = connect(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let indexes: [(&'static str, &'static str, Document); 4] = [
            (
                PARTICIPANT_COLLECTION_NAME,
                "body.status",
                doc! { "body.status": 1, "body.name": 1 },
            ),
            (
                QUESTION_COLLECTION_NAME,
                "theme_key",
                doc! { "theme_key": 1, "body.difficulty": 1 },
            ),
            (SESSION_COLLECTION_NAME, "body.status", doc! { "body.status": 1 }),
            (THEME_COLLECTION_NAME, "body.name", doc! { "body.name": 1 }),
        ];

        let database = self.database().await;
        for (collection, index, keys) in indexes {
            let model = mongodb::IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_{index}_idx")))
                        .build(),
                )
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::Index {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn participants(&self) -> Collection<MongoDocument<ParticipantEntity>> {
        self.database().await.collection(PARTICIPANT_COLLECTION_NAME)
    }

    async fn themes(&self) -> Collection<MongoDocument<ThemeEntity>> {
        self.database().await.collection(THEME_COLLECTION_NAME)
    }

    async fn questions(&self) -> Collection<MongoQuestionDocument> {
        self.database().await.collection(QUESTION_COLLECTION_NAME)
    }

    async fn sessions(&self) -> Collection<MongoDocument<GameSessionEntity>> {
        self.database().await.collection(SESSION_COLLECTION_NAME)
    }

    async fn save_participant(&self, participant: ParticipantEntity) -> MongoResult<()> {
        let id = participant.id;
        self.participants()
            .await
            .replace_one(key_filter(id), &MongoDocument::new(id, participant))
            .upsert(true)
            .await
            .map_err(write_error(PARTICIPANT_COLLECTION_NAME))?;
        Ok(())
    }

    async fn find_participant(&self, id: Uuid) -> MongoResult<Option<ParticipantEntity>> {
        let document = self
            .participants()
            .await
            .find_one(key_filter(id))
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION_NAME))?;
        Ok(document.map(|document| document.body))
    }

    async fn delete_participant(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .participants()
            .await
            .delete_one(key_filter(id))
            .await
            .map_err(write_error(PARTICIPANT_COLLECTION_NAME))?;
        Ok(result.deleted_count > 0)
    }

    async fn list_participants(
        &self,
        status: Option<ParticipantStatus>,
        page: PageRequest,
    ) -> MongoResult<Page<ParticipantEntity>> {
        let filter = match status {
            Some(status) => doc! { "body.status": status.as_str() },
            None => doc! {},
        };
        let collection = self.participants().await;
        let total = collection
            .count_documents(filter.clone())
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION_NAME))?;
        let documents: Vec<MongoDocument<ParticipantEntity>> = collection
            .find(filter)
            .sort(doc! { "body.created_at": 1 })
            .skip(page.offset() as u64)
            .limit(i64::from(page.per_page))
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION_NAME))?;

        Ok(Page {
            items: documents.into_iter().map(|document| document.body).collect(),
            total,
        })
    }

    /// Without multi-document transactions the claim is a guarded `update_many`; the single
    /// writer above the store guarantees nobody else flips these participants meanwhile.
    async fn claim_participants(&self, ids: Vec<Uuid>) -> MongoResult<ClaimOutcome> {
        let collection = self.participants().await;
        let found: Vec<MongoDocument<ParticipantEntity>> = collection
            .find(keys_filter(&ids))
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION_NAME))?;

        let mut unknown = Vec::new();
        let mut unavailable = Vec::new();
        for id in &ids {
            match found.iter().find(|document| document.body.id == *id) {
                None => unknown.push(*id),
                Some(document) if document.body.status != ParticipantStatus::Waiting => {
                    unavailable.push(*id)
                }
                Some(_) => {}
            }
        }
        if !unknown.is_empty() || !unavailable.is_empty() {
            return Ok(ClaimOutcome::Rejected {
                unknown,
                unavailable,
            });
        }

        let mut filter = keys_filter(&ids);
        filter.insert("body.status", ParticipantStatus::Waiting.as_str());
        let result = collection
            .update_many(
                filter,
                doc! { "$set": { "body.status": ParticipantStatus::Playing.as_str() } },
            )
            .await
            .map_err(write_error(PARTICIPANT_COLLECTION_NAME))?;

        if result.modified_count != ids.len() as u64 {
            warn!(
                expected = ids.len(),
                modified = result.modified_count,
                "participant claim raced with another writer; rolling back"
            );
            collection
                .update_many(
                    keys_filter(&ids),
                    doc! { "$set": { "body.status": ParticipantStatus::Waiting.as_str() } },
                )
                .await
                .map_err(write_error(PARTICIPANT_COLLECTION_NAME))?;
            return Ok(ClaimOutcome::Rejected {
                unknown: Vec::new(),
                unavailable: ids,
            });
        }

        let claimed = ids
            .iter()
            .filter_map(|id| found.iter().find(|document| document.body.id == *id))
            .map(|document| ParticipantEntity {
                status: ParticipantStatus::Playing,
                ..document.body.clone()
            })
            .collect();
        Ok(ClaimOutcome::Claimed(claimed))
    }

    async fn release_participants(
        &self,
        ids: Vec<Uuid>,
        status: ParticipantStatus,
    ) -> MongoResult<()> {
        self.participants()
            .await
            .update_many(
                keys_filter(&ids),
                doc! { "$set": { "body.status": status.as_str() } },
            )
            .await
            .map_err(write_error(PARTICIPANT_COLLECTION_NAME))?;
        Ok(())
    }

    async fn save_theme(&self, theme: ThemeEntity) -> MongoResult<()> {
        let id = theme.id;
        self.themes()
            .await
            .replace_one(key_filter(id), &MongoDocument::new(id, theme))
            .upsert(true)
            .await
            .map_err(write_error(THEME_COLLECTION_NAME))?;
        Ok(())
    }

    async fn find_theme(&self, id: Uuid) -> MongoResult<Option<ThemeEntity>> {
        let document = self
            .themes()
            .await
            .find_one(key_filter(id))
            .await
            .map_err(read_error(THEME_COLLECTION_NAME))?;
        Ok(document.map(|document| document.body))
    }

    async fn delete_theme(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .themes()
            .await
            .delete_one(key_filter(id))
            .await
            .map_err(write_error(THEME_COLLECTION_NAME))?;
        Ok(result.deleted_count > 0)
    }

    async fn list_themes(&self) -> MongoResult<Vec<ThemeEntity>> {
        let documents: Vec<MongoDocument<ThemeEntity>> = self
            .themes()
            .await
            .find(doc! {})
            .sort(doc! { "body.name": 1 })
            .await
            .map_err(read_error(THEME_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(read_error(THEME_COLLECTION_NAME))?;
        Ok(documents.into_iter().map(|document| document.body).collect())
    }

    async fn save_question(&self, question: QuestionEntity) -> MongoResult<()> {
        let id = question.id;
        self.questions()
            .await
            .replace_one(key_filter(id), &MongoQuestionDocument::from(question))
            .upsert(true)
            .await
            .map_err(write_error(QUESTION_COLLECTION_NAME))?;
        Ok(())
    }

    async fn find_question(&self, id: Uuid) -> MongoResult<Option<QuestionEntity>> {
        let document = self
            .questions()
            .await
            .find_one(key_filter(id))
            .await
            .map_err(read_error(QUESTION_COLLECTION_NAME))?;
        Ok(document.map(|document| document.body))
    }

    async fn delete_question(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .questions()
            .await
            .delete_one(key_filter(id))
            .await
            .map_err(write_error(QUESTION_COLLECTION_NAME))?;
        Ok(result.deleted_count > 0)
    }

    fn question_filter(theme_id: Option<Uuid>, difficulty: Option<&str>) -> Document {
        let mut filter = doc! {};
        if let Some(theme_id) = theme_id {
            filter.insert("theme_key", theme_id.to_string());
        }
        if let Some(difficulty) = difficulty {
            filter.insert("body.difficulty", difficulty);
        }
        filter
    }

    async fn list_questions(
        &self,
        filter: QuestionFilter,
        page: PageRequest,
    ) -> MongoResult<Page<QuestionEntity>> {
        let filter = Self::question_filter(
            filter.theme_id,
            filter.difficulty.as_ref().map(|difficulty| difficulty.as_str()),
        );
        let collection = self.questions().await;
        let total = collection
            .count_documents(filter.clone())
            .await
            .map_err(read_error(QUESTION_COLLECTION_NAME))?;
        let documents: Vec<MongoQuestionDocument> = collection
            .find(filter)
            .sort(doc! { "body.created_at": 1 })
            .skip(page.offset() as u64)
            .limit(i64::from(page.per_page))
            .await
            .map_err(read_error(QUESTION_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(read_error(QUESTION_COLLECTION_NAME))?;

        Ok(Page {
            items: documents.into_iter().map(|document| document.body).collect(),
            total,
        })
    }

    async fn next_question(&self, query: QuestionQuery) -> MongoResult<Option<QuestionEntity>> {
        let mut filter = Self::question_filter(
            query.theme_id,
            query.difficulty.as_ref().map(|difficulty| difficulty.as_str()),
        );
        if !query.excluding.is_empty() {
            let excluded: Vec<String> = query.excluding.iter().map(Uuid::to_string).collect();
            filter.insert("_id", doc! { "$nin": excluded });
        }

        let candidates: Vec<MongoQuestionDocument> = self
            .questions()
            .await
            .find(filter)
            .await
            .map_err(read_error(QUESTION_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(read_error(QUESTION_COLLECTION_NAME))?;

        let picked = candidates
            .choose(&mut rand::rng())
            .map(|document| document.body.clone());
        Ok(picked)
    }

    async fn save_session(&self, session: GameSessionEntity) -> MongoResult<()> {
        let id = session.id;
        self.sessions()
            .await
            .replace_one(key_filter(id), &MongoDocument::new(id, session))
            .upsert(true)
            .await
            .map_err(write_error(SESSION_COLLECTION_NAME))?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> MongoResult<Option<GameSessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one(key_filter(id))
            .await
            .map_err(read_error(SESSION_COLLECTION_NAME))?;
        Ok(document.map(|document| document.body))
    }

    async fn list_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> MongoResult<Vec<GameSessionEntity>> {
        let filter = match status {
            Some(status) => doc! { "body.status": status.as_str() },
            None => doc! {},
        };
        let documents: Vec<MongoDocument<GameSessionEntity>> = self
            .sessions()
            .await
            .find(filter)
            .sort(doc! { "body.started_at": 1 })
            .await
            .map_err(read_error(SESSION_COLLECTION_NAME))?
            .try_collect()
            .await
            .map_err(read_error(SESSION_COLLECTION_NAME))?;
        Ok(documents.into_iter().map(|document| document.body).collect())
    }
}

impl GameStore for MongoGameStore {
    fn save_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_participant(participant).await.map_err(Into::into) })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_participant(id).await.map_err(Into::into) })
    }

    fn delete_participant(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_participant(id).await.map_err(Into::into) })
    }

    fn list_participants(
        &self,
        status: Option<ParticipantStatus>,
        page: PageRequest,
    ) -> BoxFuture<'static, StorageResult<Page<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_participants(status, page)
                .await
                .map_err(Into::into)
        })
    }

    fn claim_participants(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<ClaimOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.claim_participants(ids).await.map_err(Into::into) })
    }

    fn release_participants(
        &self,
        ids: Vec<Uuid>,
        status: ParticipantStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .release_participants(ids, status)
                .await
                .map_err(Into::into)
        })
    }

    fn save_theme(&self, theme: ThemeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_theme(theme).await.map_err(Into::into) })
    }

    fn find_theme(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ThemeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_theme(id).await.map_err(Into::into) })
    }

    fn delete_theme(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_theme(id).await.map_err(Into::into) })
    }

    fn list_themes(&self) -> BoxFuture<'static, StorageResult<Vec<ThemeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_themes().await.map_err(Into::into) })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_question(question).await.map_err(Into::into) })
    }

    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_question(id).await.map_err(Into::into) })
    }

    fn delete_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_question(id).await.map_err(Into::into) })
    }

    fn list_questions(
        &self,
        filter: QuestionFilter,
        page: PageRequest,
    ) -> BoxFuture<'static, StorageResult<Page<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_questions(filter, page).await.map_err(Into::into) })
    }

    fn next_question(
        &self,
        query: QuestionQuery,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.next_question(query).await.map_err(Into::into) })
    }

    fn save_session(&self, session: GameSessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_session(session).await.map_err(Into::into) })
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn list_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_sessions(status).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
