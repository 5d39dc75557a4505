use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Hint {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub question_id: Uuid,
    pub level: i32,
    pub hint_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHint {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub question_id: Uuid,
    /// `current_index` the exam must still be at when the hint is stored.
    pub expected_index: i32,
    pub level: i32,
    pub hint_text: String,
}

impl NewHint {
    pub fn into_row(self, created_at: DateTime<Utc>) -> Hint {
        Hint {
            id: self.id,
            exam_id: self.exam_id,
            question_id: self.question_id,
            level: self.level,
            hint_text: self.hint_text,
            created_at,
        }
    }
}
