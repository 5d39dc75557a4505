use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::Result;
use crate::models::catalog::{Category, Difficulty, ExamStatus, Mode, QuestionType, Topic};

#[derive(Debug, Clone, FromRow)]
pub struct Exam {
    pub id: Uuid,
    pub topic: String,
    pub difficulty: String,
    pub category: String,
    pub mode: String,
    pub question_type: String,
    pub total_questions: i32,
    /// Number of answered questions.
    pub current_index: i32,
    pub hints_used: i32,
    pub time_limit_seconds: Option<i32>,
    pub status: String,
    pub total_score: Decimal,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Exam {
    pub fn status(&self) -> Result<ExamStatus> {
        self.status.parse()
    }

    pub fn mode(&self) -> Result<Mode> {
        self.mode.parse()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status(), Ok(ExamStatus::Completed))
    }

    /// Position of the question currently awaiting an answer.
    pub fn pending_position(&self) -> Option<i32> {
        if self.is_completed() || self.current_index >= self.total_questions {
            None
        } else {
            Some(self.current_index + 1)
        }
    }

    pub fn phase(&self) -> ExamPhase {
        if self.is_completed() {
            ExamPhase::Completed
        } else {
            ExamPhase::AwaitingAnswer
        }
    }
}

/// Client-visible progression state. `Grading` only exists inside a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamPhase {
    AwaitingAnswer,
    Grading,
    Completed,
}

#[derive(Debug, Clone)]
pub struct NewExam {
    pub id: Uuid,
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub category: Category,
    pub mode: Mode,
    pub question_type: QuestionType,
    pub total_questions: i32,
    pub time_limit_seconds: Option<i32>,
}

impl NewExam {
    pub fn into_row(self, created_at: DateTime<Utc>) -> Exam {
        Exam {
            id: self.id,
            topic: self.topic.to_string(),
            difficulty: self.difficulty.to_string(),
            category: self.category.to_string(),
            mode: self.mode.to_string(),
            question_type: self.question_type.to_string(),
            total_questions: self.total_questions,
            current_index: 0,
            hints_used: 0,
            time_limit_seconds: self.time_limit_seconds,
            status: ExamStatus::InProgress.to_string(),
            total_score: Decimal::ZERO,
            created_at,
            completed_at: None,
        }
    }
}
