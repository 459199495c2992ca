use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{PageRequest, QuestionEntity, QuestionFilter, ThemeEntity},
    dto::question::{
        CreateThemeRequest, QuestionInput, QuestionListQuery, QuestionPage, QuestionSummary,
        ThemeSummary,
    },
    error::ServiceError,
    state::SharedState,
};

pub async fn create_theme(
    state: &SharedState,
    request: CreateThemeRequest,
) -> Result<ThemeSummary, ServiceError> {
    let store = state.require_game_store().await?;
    let theme = ThemeEntity {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        description: request.description,
        created_at: SystemTime::now(),
    };
    store.save_theme(theme.clone()).await?;
    info!(theme_id = %theme.id, name = %theme.name, "theme created");
    Ok(theme.into())
}

pub async fn list_themes(state: &SharedState) -> Result<Vec<ThemeSummary>, ServiceError> {
    let store = state.require_game_store().await?;
    Ok(store
        .list_themes()
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Delete a theme that no question and no running session refers to.
pub async fn delete_theme(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_game_store().await?;
    if store.find_theme(id).await?.is_none() {
        return Err(theme_not_found(id));
    }

    let in_use = store
        .list_questions(
            QuestionFilter {
                theme_id: Some(id),
                difficulty: None,
            },
            PageRequest::new(Some(1), Some(1)),
        )
        .await?
        .total;
    if in_use > 0 {
        return Err(ServiceError::ConflictingSession(format!(
            "theme `{id}` still has {in_use} question(s)"
        )));
    }
    if let Some(active) = state.sessions().active().await {
        if active.theme_id == Some(id) {
            return Err(ServiceError::ConflictingSession(format!(
                "theme `{id}` is used by the active session"
            )));
        }
    }

    store.delete_theme(id).await?;
    info!(theme_id = %id, "theme deleted");
    Ok(())
}

/// Add a question to the bank.
pub async fn create_question(
    state: &SharedState,
    input: QuestionInput,
) -> Result<QuestionSummary, ServiceError> {
    let store = state.require_game_store().await?;
    if let Some(theme_id) = input.theme_id {
        if store.find_theme(theme_id).await?.is_none() {
            return Err(theme_not_found(theme_id));
        }
    }
    let question = build_question(Uuid::new_v4(), input, SystemTime::now());
    store.save_question(question.clone()).await?;
    info!(question_id = %question.id, difficulty = question.difficulty.as_str(), "question created");
    Ok(question.into())
}

pub async fn get_question(state: &SharedState, id: Uuid) -> Result<QuestionSummary, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_question(id)
        .await?
        .map(QuestionSummary::from)
        .ok_or_else(|| question_not_found(id))
}

pub async fn list_questions(
    state: &SharedState,
    query: QuestionListQuery,
) -> Result<QuestionPage, ServiceError> {
    let store = state.require_game_store().await?;
    let page = PageRequest::new(query.page, query.per_page);
    let filter = QuestionFilter {
        theme_id: query.theme_id,
        difficulty: query.difficulty,
    };
    let result = store.list_questions(filter, page).await?;
    Ok(QuestionPage {
        items: result.items.into_iter().map(Into::into).collect(),
        total: result.total,
        page: page.page,
        per_page: page.per_page,
    })
}

/// Replace a question, unless it is being asked right now.
pub async fn update_question(
    state: &SharedState,
    id: Uuid,
    input: QuestionInput,
) -> Result<QuestionSummary, ServiceError> {
    let store = state.require_game_store().await?;
    let existing = store
        .find_question(id)
        .await?
        .ok_or_else(|| question_not_found(id))?;
    ensure_not_current(state, id).await?;
    if let Some(theme_id) = input.theme_id {
        if store.find_theme(theme_id).await?.is_none() {
            return Err(theme_not_found(theme_id));
        }
    }

    let question = build_question(id, input, existing.created_at);
    store.save_question(question.clone()).await?;
    info!(question_id = %id, "question updated");
    Ok(question.into())
}

pub async fn delete_question(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_game_store().await?;
    ensure_not_current(state, id).await?;
    if !store.delete_question(id).await? {
        return Err(question_not_found(id));
    }
    info!(question_id = %id, "question deleted");
    Ok(())
}

async fn ensure_not_current(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let current = state
        .sessions()
        .active()
        .await
        .and_then(|session| session.current_question.map(|question| question.id));
    if current == Some(id) {
        return Err(ServiceError::ConflictingSession(format!(
            "question `{id}` is the current question of the active session"
        )));
    }
    Ok(())
}

fn build_question(id: Uuid, input: QuestionInput, created_at: SystemTime) -> QuestionEntity {
    QuestionEntity {
        id,
        theme_id: input.theme_id,
        text: input.text.trim().to_string(),
        option_a: input.option_a.trim().to_string(),
        option_b: input.option_b.trim().to_string(),
        option_c: input.option_c.trim().to_string(),
        correct_answer: input.correct_answer,
        difficulty: input.difficulty,
        created_at,
    }
}

fn theme_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("theme `{id}` not found"))
}

fn question_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("question `{id}` not found"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            game_store::MemoryGameStore,
            models::{AnswerChoice, Difficulty},
        },
        state::AppState,
    };

    async fn state_with_store() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .install_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        state
    }

    fn input(theme_id: Option<Uuid>) -> QuestionInput {
        QuestionInput {
            theme_id,
            text: " Largest planet? ".into(),
            option_a: "Mars".into(),
            option_b: "Jupiter".into(),
            option_c: "Venus".into(),
            correct_answer: AnswerChoice::B,
            difficulty: Difficulty::Medium,
        }
    }

    #[tokio::test]
    async fn questions_require_an_existing_theme() {
        let state = state_with_store().await;
        let missing = create_question(&state, input(Some(Uuid::new_v4()))).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let theme = create_theme(
            &state,
            CreateThemeRequest {
                name: "Space".into(),
                description: None,
            },
        )
        .await
        .unwrap();
        let question = create_question(&state, input(Some(theme.id))).await.unwrap();
        assert_eq!(question.text, "Largest planet?");

        let page = list_questions(
            &state,
            QuestionListQuery {
                theme_id: Some(theme.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn theme_with_questions_cannot_be_deleted() {
        let state = state_with_store().await;
        let theme = create_theme(
            &state,
            CreateThemeRequest {
                name: "History".into(),
                description: Some("Dates and people".into()),
            },
        )
        .await
        .unwrap();
        let question = create_question(&state, input(Some(theme.id))).await.unwrap();

        assert!(matches!(
            delete_theme(&state, theme.id).await,
            Err(ServiceError::ConflictingSession(_))
        ));

        delete_question(&state, question.id).await.unwrap();
        delete_theme(&state, theme.id).await.unwrap();
        assert!(list_themes(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_identity_and_creation_time() {
        let state = state_with_store().await;
        let created = create_question(&state, input(None)).await.unwrap();

        let mut changed = input(None);
        changed.correct_answer = AnswerChoice::C;
        let updated = update_question(&state, created.id, changed).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.correct_answer, AnswerChoice::C);

        let missing = update_question(&state, Uuid::new_v4(), input(None)).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }
}
