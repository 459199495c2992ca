use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{PageRequest, ParticipantEntity, ParticipantStatus},
    dto::participant::{
        CreateParticipantRequest, ParticipantListQuery, ParticipantPage, ParticipantSummary,
        UpdateParticipantRequest,
    },
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Register a new contestant, available for selection.
pub async fn register(
    state: &SharedState,
    request: CreateParticipantRequest,
) -> Result<ParticipantSummary, ServiceError> {
    let store = state.require_game_store().await?;
    let entity = ParticipantEntity {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        city: request.city.trim().to_string(),
        state: request.state.trim().to_string(),
        photo_url: request.photo_url,
        status: ParticipantStatus::Waiting,
        created_at: SystemTime::now(),
    };
    store.save_participant(entity.clone()).await?;

    let summary = ParticipantSummary::from(entity);
    info!(participant_id = %summary.id, name = %summary.name, "participant registered");
    sse_events::broadcast_participant_registered(state, summary.clone());
    Ok(summary)
}

pub async fn get(state: &SharedState, id: Uuid) -> Result<ParticipantSummary, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_participant(id)
        .await?
        .map(ParticipantSummary::from)
        .ok_or_else(|| not_found(id))
}

pub async fn list(
    state: &SharedState,
    query: ParticipantListQuery,
) -> Result<ParticipantPage, ServiceError> {
    let store = state.require_game_store().await?;
    let page = PageRequest::new(query.page, query.per_page);
    let result = store.list_participants(query.status, page).await?;
    Ok(ParticipantPage {
        items: result.items.into_iter().map(Into::into).collect(),
        total: result.total,
        page: page.page,
        per_page: page.per_page,
    })
}

/// Edit a contestant who is not currently seated.
pub async fn update(
    state: &SharedState,
    id: Uuid,
    request: UpdateParticipantRequest,
) -> Result<ParticipantSummary, ServiceError> {
    if request.status == Some(ParticipantStatus::Playing) {
        return Err(ServiceError::InvalidInput(
            "participants only become playing when a session starts".into(),
        ));
    }

    let _gate = state.lock_transitions().await;
    let store = state.require_game_store().await?;
    let mut entity = store.find_participant(id).await?.ok_or_else(|| not_found(id))?;
    ensure_not_playing(&entity)?;

    let UpdateParticipantRequest {
        name,
        city,
        state: region,
        photo_url,
        status,
    } = request;
    if let Some(name) = name {
        entity.name = name.trim().to_string();
    }
    if let Some(city) = city {
        entity.city = city.trim().to_string();
    }
    if let Some(region) = region {
        entity.state = region.trim().to_string();
    }
    if let Some(photo_url) = photo_url {
        entity.photo_url = photo_url;
    }
    if let Some(status) = status {
        entity.status = status;
    }
    store.save_participant(entity.clone()).await?;

    let summary = ParticipantSummary::from(entity);
    info!(participant_id = %id, "participant updated");
    sse_events::broadcast_participant_updated(state, summary.clone());
    Ok(summary)
}

/// Remove a contestant who is not currently seated.
pub async fn delete(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let _gate = state.lock_transitions().await;
    let store = state.require_game_store().await?;
    let entity = store.find_participant(id).await?.ok_or_else(|| not_found(id))?;
    ensure_not_playing(&entity)?;

    if !store.delete_participant(id).await? {
        return Err(not_found(id));
    }
    info!(participant_id = %id, "participant deleted");
    sse_events::broadcast_participant_deleted(state, id);
    Ok(())
}

fn ensure_not_playing(entity: &ParticipantEntity) -> Result<(), ServiceError> {
    if entity.status == ParticipantStatus::Playing {
        return Err(ServiceError::ConflictingSession(format!(
            "participant `{}` is playing in the active session",
            entity.id
        )));
    }
    Ok(())
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("participant `{id}` not found"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::{GameStore, MemoryGameStore},
        state::AppState,
    };

    async fn state_with_store() -> (SharedState, MemoryGameStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        state.install_game_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn request(name: &str) -> CreateParticipantRequest {
        CreateParticipantRequest {
            name: format!("  {name} "),
            city: "Olinda".into(),
            state: "PE".into(),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn registration_trims_and_notifies_operators() {
        let (state, _store) = state_with_store().await;
        let mut admin = state.admin_sse().subscribe();

        let summary = register(&state, request("Ana")).await.unwrap();

        assert_eq!(summary.name, "Ana");
        assert_eq!(summary.status, ParticipantStatus::Waiting);
        let event = admin.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("participant.registered"));
    }

    #[tokio::test]
    async fn playing_participants_cannot_be_edited_or_deleted() {
        let (state, store) = state_with_store().await;
        let summary = register(&state, request("Ana")).await.unwrap();
        store
            .release_participants(vec![summary.id], ParticipantStatus::Playing)
            .await
            .unwrap();

        let edit = update(
            &state,
            summary.id,
            UpdateParticipantRequest {
                name: Some("Ana Paula".into()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(edit, Err(ServiceError::ConflictingSession(_))));
        assert!(matches!(
            delete(&state, summary.id).await,
            Err(ServiceError::ConflictingSession(_))
        ));
    }

    #[tokio::test]
    async fn status_can_be_retired_but_not_set_to_playing() {
        let (state, _store) = state_with_store().await;
        let summary = register(&state, request("Bia")).await.unwrap();

        let forced = update(
            &state,
            summary.id,
            UpdateParticipantRequest {
                status: Some(ParticipantStatus::Playing),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(forced, Err(ServiceError::InvalidInput(_))));

        let retired = update(
            &state,
            summary.id,
            UpdateParticipantRequest {
                status: Some(ParticipantStatus::Retired),
                photo_url: Some(Some("https://cdn.example.com/bia.png".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(retired.status, ParticipantStatus::Retired);
        assert!(retired.photo_url.is_some());
    }

    #[tokio::test]
    async fn null_photo_clears_and_absent_photo_keeps() {
        let (state, _store) = state_with_store().await;
        let summary = register(
            &state,
            CreateParticipantRequest {
                photo_url: Some("https://cdn.example.com/caio.png".into()),
                ..request("Caio")
            },
        )
        .await
        .unwrap();

        let renamed: UpdateParticipantRequest =
            serde_json::from_str(r#"{ "name": "Caio Jr" }"#).unwrap();
        let kept = update(&state, summary.id, renamed).await.unwrap();
        assert_eq!(kept.photo_url.as_deref(), Some("https://cdn.example.com/caio.png"));

        let cleared: UpdateParticipantRequest =
            serde_json::from_str(r#"{ "photo_url": null }"#).unwrap();
        let cleared = update(&state, summary.id, cleared).await.unwrap();
        assert_eq!(cleared.photo_url, None);
        assert_eq!(cleared.name, "Caio Jr");
    }

    #[tokio::test]
    async fn listing_filters_by_status() {
        let (state, _store) = state_with_store().await;
        let first = register(&state, request("Ana")).await.unwrap();
        register(&state, request("Bia")).await.unwrap();
        update(
            &state,
            first.id,
            UpdateParticipantRequest {
                status: Some(ParticipantStatus::Retired),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let page = list(
            &state,
            ParticipantListQuery {
                status: Some(ParticipantStatus::Waiting),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Bia");

        assert!(matches!(
            get(&state, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
