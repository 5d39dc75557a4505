use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::catalog::{Category, Difficulty, QuestionType, Topic};

pub const OPTION_LETTERS: [&str; 4] = ["A", "B", "C", "D"];

/// Multiple-choice options keyed by letter.
pub type ChoiceOptions = BTreeMap<String, String>;

/// Stored question, including the correct answer. Never serialized to clients.
#[derive(Debug, Clone, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub position: i32,
    pub topic: String,
    pub difficulty: String,
    pub category: String,
    pub question_type: String,
    pub question_text: String,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub options: Option<JsonValue>,
    pub code_snippet: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn choice_options(&self) -> Option<ChoiceOptions> {
        self.options
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id,
            position: self.position,
            question_text: self.question_text.clone(),
            question_type: self.question_type.clone(),
            category: self.category.clone(),
            topic: self.topic.clone(),
            difficulty: self.difficulty.clone(),
            options: self.choice_options(),
            code_snippet: self.code_snippet.clone(),
        }
    }
}

/// Client-facing projection of a question: no answer, no explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionView {
    pub id: Uuid,
    pub position: i32,
    pub question_text: String,
    pub question_type: String,
    pub category: String,
    pub topic: String,
    pub difficulty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ChoiceOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

/// Validated output of the question generator, before it is attached to an exam.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub category: Category,
    pub question_type: QuestionType,
    pub question_text: String,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub options: Option<ChoiceOptions>,
    pub code_snippet: Option<String>,
}

impl GeneratedQuestion {
    pub fn into_new(self, exam_id: Uuid, position: i32) -> NewQuestion {
        NewQuestion {
            id: Uuid::new_v4(),
            exam_id,
            position,
            question: self,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub position: i32,
    pub question: GeneratedQuestion,
}

impl NewQuestion {
    pub fn options_json(&self) -> Option<JsonValue> {
        self.question
            .options
            .as_ref()
            .map(|o| serde_json::to_value(o).unwrap_or(JsonValue::Null))
    }

    pub fn into_row(self, created_at: DateTime<Utc>) -> Question {
        let options = self.options_json();
        let q = self.question;
        Question {
            id: self.id,
            exam_id: self.exam_id,
            position: self.position,
            topic: q.topic.to_string(),
            difficulty: q.difficulty.to_string(),
            category: q.category.to_string(),
            question_type: q.question_type.to_string(),
            question_text: q.question_text,
            correct_answer: q.correct_answer,
            explanation: q.explanation,
            options,
            code_snippet: q.code_snippet,
            created_at,
        }
    }
}
