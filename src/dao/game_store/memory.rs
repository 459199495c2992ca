//! Process-local store used when no database is configured and by the test suite.

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{
        ClaimOutcome, GameSessionEntity, Page, PageRequest, ParticipantEntity, ParticipantStatus,
        QuestionEntity, QuestionFilter, QuestionQuery, SessionStatus, ThemeEntity,
    },
    storage::StorageResult,
};

#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    participants: RwLock<IndexMap<Uuid, ParticipantEntity>>,
    themes: RwLock<IndexMap<Uuid, ThemeEntity>>,
    questions: RwLock<IndexMap<Uuid, QuestionEntity>>,
    sessions: RwLock<IndexMap<Uuid, GameSessionEntity>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(items: Vec<&T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset())
        .take(page.per_page as usize)
        .cloned()
        .collect();
    Page { items, total }
}

impl GameStore for MemoryGameStore {
    fn save_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner
                .participants
                .write()
                .await
                .insert(participant.id, participant);
            Ok(())
        })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.participants.read().await.get(&id).cloned()) })
    }

    fn delete_participant(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .participants
                .write()
                .await
                .shift_remove(&id)
                .is_some())
        })
    }

    fn list_participants(
        &self,
        status: Option<ParticipantStatus>,
        page: PageRequest,
    ) -> BoxFuture<'static, StorageResult<Page<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.participants.read().await;
            let matching = guard
                .values()
                .filter(|participant| status.is_none_or(|status| participant.status == status))
                .collect();
            Ok(paginate(matching, page))
        })
    }

    fn claim_participants(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<ClaimOutcome>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.participants.write().await;

            let mut unknown = Vec::new();
            let mut unavailable = Vec::new();
            for id in &ids {
                match guard.get(id) {
                    None => unknown.push(*id),
                    Some(participant) if participant.status != ParticipantStatus::Waiting => {
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

            let mut claimed = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(participant) = guard.get_mut(id) {
                    participant.status = ParticipantStatus::Playing;
                    claimed.push(participant.clone());
                }
            }
            Ok(ClaimOutcome::Claimed(claimed))
        })
    }

    fn release_participants(
        &self,
        ids: Vec<Uuid>,
        status: ParticipantStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.participants.write().await;
            for id in ids {
                if let Some(participant) = guard.get_mut(&id) {
                    participant.status = status;
                }
            }
            Ok(())
        })
    }

    fn save_theme(&self, theme: ThemeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.themes.write().await.insert(theme.id, theme);
            Ok(())
        })
    }

    fn find_theme(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ThemeEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.themes.read().await.get(&id).cloned()) })
    }

    fn delete_theme(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.themes.write().await.shift_remove(&id).is_some()) })
    }

    fn list_themes(&self) -> BoxFuture<'static, StorageResult<Vec<ThemeEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.themes.read().await.values().cloned().collect()) })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.questions.write().await.insert(question.id, question);
            Ok(())
        })
    }

    fn find_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.questions.read().await.get(&id).cloned()) })
    }

    fn delete_question(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.questions.write().await.shift_remove(&id).is_some()) })
    }

    fn list_questions(
        &self,
        filter: QuestionFilter,
        page: PageRequest,
    ) -> BoxFuture<'static, StorageResult<Page<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.questions.read().await;
            let matching = guard
                .values()
                .filter(|question| {
                    filter
                        .theme_id
                        .is_none_or(|theme| question.theme_id == Some(theme))
                        && filter
                            .difficulty
                            .is_none_or(|difficulty| question.difficulty == difficulty)
                })
                .collect();
            Ok(paginate(matching, page))
        })
    }

    fn next_question(
        &self,
        query: QuestionQuery,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.questions.read().await;
            let candidates: Vec<&QuestionEntity> =
                guard.values().filter(|question| query.matches(question)).collect();
            let picked = candidates
                .choose(&mut rand::rng())
                .map(|question| (*question).clone());
            Ok(picked)
        })
    }

    fn save_session(&self, session: GameSessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.sessions.write().await.insert(session.id, session);
            Ok(())
        })
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.sessions.read().await.get(&id).cloned()) })
    }

    fn list_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .sessions
                .read()
                .await
                .values()
                .filter(|session| status.is_none_or(|status| session.status == status))
                .cloned()
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::{AnswerChoice, Difficulty};

    fn participant(name: &str, status: ParticipantStatus) -> ParticipantEntity {
        ParticipantEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            city: "Lyon".into(),
            state: "ARA".into(),
            photo_url: None,
            status,
            created_at: SystemTime::now(),
        }
    }

    fn question(difficulty: Difficulty, theme_id: Option<Uuid>) -> QuestionEntity {
        QuestionEntity {
            id: Uuid::new_v4(),
            theme_id,
            text: "Capital of France?".into(),
            option_a: "Paris".into(),
            option_b: "Lyon".into(),
            option_c: "Nice".into(),
            correct_answer: AnswerChoice::A,
            difficulty,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn claim_flips_all_or_nothing() {
        let store = MemoryGameStore::new();
        let a = participant("a", ParticipantStatus::Waiting);
        let b = participant("b", ParticipantStatus::Waiting);
        let busy = participant("c", ParticipantStatus::Playing);
        for p in [&a, &b, &busy] {
            store.save_participant(p.clone()).await.unwrap();
        }

        let outcome = store
            .claim_participants(vec![a.id, b.id, busy.id])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::Rejected {
                unknown: vec![],
                unavailable: vec![busy.id],
            }
        );
        let a_after = store.find_participant(a.id).await.unwrap().unwrap();
        assert_eq!(a_after.status, ParticipantStatus::Waiting);

        let c = participant("c2", ParticipantStatus::Waiting);
        store.save_participant(c.clone()).await.unwrap();
        let outcome = store
            .claim_participants(vec![c.id, a.id, b.id])
            .await
            .unwrap();
        match outcome {
            ClaimOutcome::Claimed(claimed) => {
                let ids: Vec<_> = claimed.iter().map(|p| p.id).collect();
                assert_eq!(ids, vec![c.id, a.id, b.id]);
                assert!(
                    claimed
                        .iter()
                        .all(|p| p.status == ParticipantStatus::Playing)
                );
            }
            other => panic!("expected claim, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn claim_reports_unknown_ids() {
        let store = MemoryGameStore::new();
        let ghost = Uuid::new_v4();
        let outcome = store.claim_participants(vec![ghost]).await.unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::Rejected {
                unknown: vec![ghost],
                unavailable: vec![],
            }
        );
    }

    #[tokio::test]
    async fn participant_listing_filters_and_paginates() {
        let store = MemoryGameStore::new();
        for index in 0..5 {
            store
                .save_participant(participant(&format!("w{index}"), ParticipantStatus::Waiting))
                .await
                .unwrap();
        }
        store
            .save_participant(participant("busy", ParticipantStatus::Playing))
            .await
            .unwrap();

        let page = store
            .list_participants(
                Some(ParticipantStatus::Waiting),
                PageRequest::new(Some(2), Some(2)),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["w2", "w3"]);
    }

    #[tokio::test]
    async fn next_question_honours_exclusions_and_difficulty() {
        let store = MemoryGameStore::new();
        let theme = Uuid::new_v4();
        let easy = question(Difficulty::Easy, Some(theme));
        let hard = question(Difficulty::Hard, Some(theme));
        let other_theme = question(Difficulty::Easy, None);
        for q in [&easy, &hard, &other_theme] {
            store.save_question(q.clone()).await.unwrap();
        }

        let picked = store
            .next_question(QuestionQuery {
                theme_id: Some(theme),
                difficulty: Some(Difficulty::Easy),
                excluding: vec![],
            })
            .await
            .unwrap();
        assert_eq!(picked.map(|q| q.id), Some(easy.id));

        let exhausted = store
            .next_question(QuestionQuery {
                theme_id: Some(theme),
                difficulty: Some(Difficulty::Easy),
                excluding: vec![easy.id],
            })
            .await
            .unwrap();
        assert!(exhausted.is_none());
    }
}
