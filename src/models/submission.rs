use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mistake {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub resource_type: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Submission {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub question_id: Uuid,
    pub student_answer: String,
    pub raw_score: Decimal,
    pub hint_penalty: Decimal,
    pub score: Decimal,
    pub passed: bool,
    pub grade_letter: String,
    pub feedback: String,
    pub mistakes: JsonValue,
    pub strengths: JsonValue,
    pub recommendations: JsonValue,
    pub encouragement: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub question_id: Uuid,
    pub student_answer: String,
    pub raw_score: Decimal,
    pub hint_penalty: Decimal,
    pub score: Decimal,
    pub passed: bool,
    pub grade_letter: String,
    pub feedback: String,
    pub mistakes: Vec<Mistake>,
    pub strengths: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub encouragement: String,
}

impl NewSubmission {
    pub fn into_row(self, created_at: DateTime<Utc>) -> Submission {
        Submission {
            id: self.id,
            exam_id: self.exam_id,
            question_id: self.question_id,
            student_answer: self.student_answer,
            raw_score: self.raw_score,
            hint_penalty: self.hint_penalty,
            score: self.score,
            passed: self.passed,
            grade_letter: self.grade_letter,
            feedback: self.feedback,
            mistakes: serde_json::to_value(&self.mistakes).unwrap_or(JsonValue::Null),
            strengths: serde_json::to_value(&self.strengths).unwrap_or(JsonValue::Null),
            recommendations: serde_json::to_value(&self.recommendations)
                .unwrap_or(JsonValue::Null),
            encouragement: self.encouragement,
            created_at,
        }
    }
}
