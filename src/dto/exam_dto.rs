use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::catalog::{Category, Difficulty, Mode, QuestionType, Topic};
use crate::models::exam::ExamPhase;
use crate::models::question::{ChoiceOptions, QuestionView};
use crate::models::submission::{Mistake, Recommendation};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StartExamRequest {
    pub topic: Topic,
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 20))]
    pub num_questions: Option<u32>,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub mode: Mode,
    /// Per-question limit; `None` uses the mode default.
    #[validate(range(min = 30, max = 3600))]
    pub time_limit_seconds: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExamResponse {
    pub exam_id: Uuid,
    pub total_questions: i32,
    pub current_index: i32,
    pub mode: Mode,
    pub time_limit_seconds: Option<i32>,
    pub question: QuestionView,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub exam_id: String,
    #[validate(length(min = 1, max = 20000))]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub is_correct: bool,
    pub score: f64,
    pub max_score: f64,
    pub hint_penalty: f64,
    pub grade_letter: String,
    pub feedback: String,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub encouragement: String,
    pub mistakes: Vec<Mistake>,
    pub strengths: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub exam_completed: bool,
    /// Displayed number of the next question, or the total once completed.
    pub current_index: i32,
    pub total_questions: i32,
    pub score_so_far: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_summary: Option<ExamSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintRequest {
    pub exam_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintResponse {
    pub hint: String,
    pub hints_used: i32,
    pub hint_level: i32,
    /// Cumulative fraction of the question's max score that will be deducted.
    pub score_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub position: i32,
    pub question_text: String,
    pub correct_answer: String,
    pub student_answer: String,
    pub score: f64,
    pub is_correct: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSummary {
    pub exam_id: Uuid,
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub total_questions: i32,
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub grade_letter: String,
    pub passed: bool,
    pub hints_used: i32,
    pub questions: Vec<QuestionResult>,
}

/// One question in the exam detail view. Answer fields only appear once graded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamQuestionDetail {
    pub position: i32,
    pub question_text: String,
    pub question_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ChoiceOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    pub pending: bool,
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamDetailResponse {
    pub exam_id: Uuid,
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    pub category: Category,
    pub mode: Mode,
    pub total_questions: i32,
    pub current_index: i32,
    pub score_total: f64,
    pub hints_used: i32,
    pub time_limit_seconds: Option<i32>,
    pub status: String,
    pub phase: ExamPhase,
    pub questions: Vec<ExamQuestionDetail>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamListItem {
    pub exam_id: Uuid,
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    pub category: Category,
    pub mode: Mode,
    pub total_questions: i32,
    pub score_total: f64,
    pub hints_used: i32,
    pub status: String,
    pub percentage: f64,
    pub grade_letter: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
