use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{AnswerChoice, Difficulty, QuestionEntity, ThemeEntity},
    dto::{format_system_time, validation::validate_not_blank},
    state::game::GameQuestion,
};

/// Question as shown during a round; the answer key is only present for privileged viewers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: Uuid,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub difficulty: Difficulty,
    pub round_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<AnswerChoice>,
}

impl QuestionView {
    /// Project `question`, revealing the answer key only when `reveal` is set.
    pub fn new(question: &GameQuestion, reveal: bool) -> Self {
        Self {
            id: question.id,
            text: question.text.clone(),
            option_a: question.option_a.clone(),
            option_b: question.option_b.clone(),
            option_c: question.option_c.clone(),
            difficulty: question.difficulty,
            round_number: question.round_number,
            correct_answer: reveal.then_some(question.correct_answer),
        }
    }
}

/// Payload used to add a question to the bank, or to replace one.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuestionInput {
    pub theme_id: Option<Uuid>,
    #[validate(length(max = 500), custom(function = validate_not_blank))]
    pub text: String,
    #[validate(length(max = 200), custom(function = validate_not_blank))]
    pub option_a: String,
    #[validate(length(max = 200), custom(function = validate_not_blank))]
    pub option_b: String,
    #[validate(length(max = 200), custom(function = validate_not_blank))]
    pub option_c: String,
    pub correct_answer: AnswerChoice,
    pub difficulty: Difficulty,
}

/// Bank question exposed to admins.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionSummary {
    pub id: Uuid,
    pub theme_id: Option<Uuid>,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub correct_answer: AnswerChoice,
    pub difficulty: Difficulty,
    pub created_at: String,
}

impl From<QuestionEntity> for QuestionSummary {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            theme_id: value.theme_id,
            text: value.text,
            option_a: value.option_a,
            option_b: value.option_b,
            option_c: value.option_c,
            correct_answer: value.correct_answer,
            difficulty: value.difficulty,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Filters accepted by the question listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuestionListQuery {
    pub theme_id: Option<Uuid>,
    pub difficulty: Option<Difficulty>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// One page of bank questions.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionPage {
    pub items: Vec<QuestionSummary>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Payload used to create a theme.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateThemeRequest {
    #[validate(length(max = 120), custom(function = validate_not_blank))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThemeSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl From<ThemeEntity> for ThemeSummary {
    fn from(value: ThemeEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            created_at: format_system_time(value.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn game_question() -> GameQuestion {
        GameQuestion {
            id: Uuid::new_v4(),
            theme_id: None,
            text: "2 + 2?".into(),
            option_a: "3".into(),
            option_b: "4".into(),
            option_c: "5".into(),
            correct_answer: AnswerChoice::B,
            difficulty: Difficulty::Easy,
            round_number: 1,
        }
    }

    #[test]
    fn public_view_hides_the_answer_key() {
        let question = game_question();
        let public = serde_json::to_value(QuestionView::new(&question, false)).unwrap();
        assert!(public.get("correct_answer").is_none());

        let admin = serde_json::to_value(QuestionView::new(&question, true)).unwrap();
        assert_eq!(admin["correct_answer"], "B");
    }

    #[test]
    fn blank_question_text_fails_validation() {
        let input = QuestionInput {
            theme_id: None,
            text: "  ".into(),
            option_a: "a".into(),
            option_b: "b".into(),
            option_c: "c".into(),
            correct_answer: AnswerChoice::A,
            difficulty: Difficulty::Hard,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("text"));
    }

    #[test]
    fn summary_formats_creation_time() {
        let summary = QuestionSummary::from(QuestionEntity {
            id: Uuid::new_v4(),
            theme_id: None,
            text: "t".into(),
            option_a: "a".into(),
            option_b: "b".into(),
            option_c: "c".into(),
            correct_answer: AnswerChoice::C,
            difficulty: Difficulty::Medium,
            created_at: SystemTime::UNIX_EPOCH,
        });
        assert_eq!(summary.created_at, "1970-01-01T00:00:00Z");
    }
}
