use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::QuestionEntity;

/// Wrapper storing an entity under a string primary key.
///
/// Filters address entity fields through the `body.` prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDocument<T> {
    #[serde(rename = "_id")]
    pub key: String,
    pub body: T,
}

impl<T> MongoDocument<T> {
    pub fn new(id: Uuid, body: T) -> Self {
        Self {
            key: id.to_string(),
            body,
        }
    }
}

/// Question document carrying its theme as a string so it can be filtered on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    pub key: String,
    pub theme_key: Option<String>,
    pub body: QuestionEntity,
}

impl From<QuestionEntity> for MongoQuestionDocument {
    fn from(value: QuestionEntity) -> Self {
        Self {
            key: value.id.to_string(),
            theme_key: value.theme_id.map(|id| id.to_string()),
            body: value,
        }
    }
}
