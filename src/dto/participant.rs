use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{ParticipantEntity, ParticipantStatus},
    dto::{format_system_time, validation::validate_not_blank},
};

/// Payload used to register a contestant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateParticipantRequest {
    #[validate(length(max = 120), custom(function = validate_not_blank))]
    pub name: String,
    #[validate(length(max = 120), custom(function = validate_not_blank))]
    pub city: String,
    #[validate(length(max = 64), custom(function = validate_not_blank))]
    pub state: String,
    #[validate(url)]
    pub photo_url: Option<String>,
}

/// Partial update of a contestant; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateParticipantRequest {
    #[validate(length(max = 120), custom(function = validate_not_blank))]
    pub name: Option<String>,
    #[validate(length(max = 120), custom(function = validate_not_blank))]
    pub city: Option<String>,
    #[validate(length(max = 64), custom(function = validate_not_blank))]
    pub state: Option<String>,
    /// `null` clears the photo; omitting the field keeps it.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub photo_url: Option<Option<String>>,
    /// Only `waiting` and `retired` can be set by hand.
    pub status: Option<ParticipantStatus>,
}

/// Public projection of a registered contestant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub state: String,
    pub photo_url: Option<String>,
    pub status: ParticipantStatus,
    pub created_at: String,
}

impl From<ParticipantEntity> for ParticipantSummary {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            city: value.city,
            state: value.state,
            photo_url: value.photo_url,
            status: value.status,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Filters accepted by the participant listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ParticipantListQuery {
    pub status: Option<ParticipantStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// One page of registered contestants.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantPage {
    pub items: Vec<ParticipantSummary>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_requires_name_and_valid_photo_url() {
        let valid = CreateParticipantRequest {
            name: "Ana".into(),
            city: "Recife".into(),
            state: "PE".into(),
            photo_url: Some("https://cdn.example.com/ana.png".into()),
        };
        assert!(valid.validate().is_ok());

        let invalid = CreateParticipantRequest {
            name: " ".into(),
            photo_url: Some("not a url".into()),
            ..valid
        };
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("photo_url"));
    }

    #[test]
    fn update_distinguishes_cleared_and_absent_photo() {
        let cleared: UpdateParticipantRequest =
            serde_json::from_str(r#"{ "photo_url": null }"#).unwrap();
        assert_eq!(cleared.photo_url, Some(None));

        let absent: UpdateParticipantRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.photo_url, None);
    }
}
