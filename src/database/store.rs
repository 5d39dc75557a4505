use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::exam::{Exam, NewExam};
use crate::models::hint::{Hint, NewHint};
use crate::models::question::{NewQuestion, Question};
use crate::models::submission::{NewSubmission, Submission};

/// Everything `record_answer` writes for one graded answer.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub exam_id: Uuid,
    /// `current_index` observed when the answer was graded.
    pub expected_index: i32,
    /// `hints_used` observed when the hint penalty was computed.
    pub expected_hints_used: i32,
    pub submission: NewSubmission,
    /// Absent when this answer completes the exam.
    pub next_question: Option<NewQuestion>,
}

#[derive(Debug, Clone)]
pub struct RecordedAnswer {
    pub exam: Exam,
    pub submission: Submission,
    pub next_question: Option<Question>,
}

/// Persistence boundary for exams.
///
/// Writes that advance an exam are conditional on `current_index` and
/// `status`; a stale writer gets `Error::InvalidState` and nothing is stored.
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn create_exam(&self, exam: NewExam, first_question: NewQuestion) -> Result<(Exam, Question)>;

    async fn get_exam(&self, exam_id: Uuid) -> Result<Exam>;

    /// Newest first.
    async fn list_exams(&self) -> Result<Vec<Exam>>;

    async fn get_question_at(&self, exam_id: Uuid, position: i32) -> Result<Question>;

    /// Ordered by position.
    async fn list_questions(&self, exam_id: Uuid) -> Result<Vec<Question>>;

    async fn list_submissions(&self, exam_id: Uuid) -> Result<Vec<Submission>>;

    /// Ordered by level.
    async fn hints_for_question(&self, question_id: Uuid) -> Result<Vec<Hint>>;

    /// Stores the hint and bumps the exam's `hints_used`.
    async fn record_hint(&self, hint: NewHint) -> Result<(Exam, Hint)>;

    /// Stores the submission, advances the exam and inserts the next question atomically.
    async fn record_answer(&self, record: AnswerRecord) -> Result<RecordedAnswer>;

    async fn ping(&self) -> bool;
}
