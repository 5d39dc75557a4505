use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::database::store::{AnswerRecord, ExamStore, RecordedAnswer};
use crate::error::{Error, Result};
use crate::models::catalog::ExamStatus;
use crate::models::exam::{Exam, NewExam};
use crate::models::hint::{Hint, NewHint};
use crate::models::question::{NewQuestion, Question};
use crate::models::submission::Submission;

#[derive(Default)]
struct Tables {
    exams: HashMap<Uuid, Exam>,
    questions: Vec<Question>,
    submissions: Vec<Submission>,
    hints: Vec<Hint>,
}

/// Process-local store used when no database is configured, and in tests.
///
/// Each operation runs under one lock, which gives it the same all-or-nothing
/// behaviour as the Postgres transactions.
#[derive(Default)]
pub struct MemoryExamStore {
    tables: Mutex<Tables>,
}

impl MemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Internal("exam store lock poisoned".to_string()))
    }
}

fn exam_not_found(exam_id: Uuid) -> Error {
    Error::NotFound(format!("Exam {} not found", exam_id))
}

#[async_trait]
impl ExamStore for MemoryExamStore {
    async fn create_exam(&self, exam: NewExam, first_question: NewQuestion) -> Result<(Exam, Question)> {
        let now = Utc::now();
        let exam = exam.into_row(now);
        let question = first_question.into_row(now);

        let mut tables = self.lock()?;
        if tables.exams.contains_key(&exam.id) {
            return Err(Error::InvalidState(format!("Exam {} already exists", exam.id)));
        }
        tables.exams.insert(exam.id, exam.clone());
        tables.questions.push(question.clone());
        Ok((exam, question))
    }

    async fn get_exam(&self, exam_id: Uuid) -> Result<Exam> {
        self.lock()?
            .exams
            .get(&exam_id)
            .cloned()
            .ok_or_else(|| exam_not_found(exam_id))
    }

    async fn list_exams(&self) -> Result<Vec<Exam>> {
        let mut exams: Vec<Exam> = self.lock()?.exams.values().cloned().collect();
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(exams)
    }

    async fn get_question_at(&self, exam_id: Uuid, position: i32) -> Result<Question> {
        self.lock()?
            .questions
            .iter()
            .find(|q| q.exam_id == exam_id && q.position == position)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("Question {} of exam {} not found", position, exam_id))
            })
    }

    async fn list_questions(&self, exam_id: Uuid) -> Result<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .lock()?
            .questions
            .iter()
            .filter(|q| q.exam_id == exam_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.position);
        Ok(questions)
    }

    async fn list_submissions(&self, exam_id: Uuid) -> Result<Vec<Submission>> {
        Ok(self
            .lock()?
            .submissions
            .iter()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn hints_for_question(&self, question_id: Uuid) -> Result<Vec<Hint>> {
        let mut hints: Vec<Hint> = self
            .lock()?
            .hints
            .iter()
            .filter(|h| h.question_id == question_id)
            .cloned()
            .collect();
        hints.sort_by_key(|h| h.level);
        Ok(hints)
    }

    async fn record_hint(&self, hint: NewHint) -> Result<(Exam, Hint)> {
        let mut tables = self.lock()?;
        if tables
            .hints
            .iter()
            .any(|h| h.question_id == hint.question_id && h.level == hint.level)
        {
            return Err(Error::InvalidState("hint at this level was already recorded".to_string()));
        }

        let exam = tables
            .exams
            .get_mut(&hint.exam_id)
            .ok_or_else(|| exam_not_found(hint.exam_id))?;
        if exam.current_index != hint.expected_index || exam.is_completed() {
            return Err(Error::InvalidState(
                "Exam moved on before the hint was stored".to_string(),
            ));
        }
        exam.hints_used += 1;
        let exam = exam.clone();

        let stored = hint.into_row(Utc::now());
        tables.hints.push(stored.clone());
        Ok((exam, stored))
    }

    async fn record_answer(&self, record: AnswerRecord) -> Result<RecordedAnswer> {
        let now = Utc::now();
        let mut tables = self.lock()?;

        let question_id = record.submission.question_id;
        if tables.submissions.iter().any(|s| s.question_id == question_id) {
            return Err(Error::InvalidState(
                "answer for this question was already recorded".to_string(),
            ));
        }

        let exam = tables
            .exams
            .get_mut(&record.exam_id)
            .ok_or_else(|| exam_not_found(record.exam_id))?;
        if exam.current_index != record.expected_index || exam.is_completed() {
            return Err(Error::InvalidState(
                "Answer was already submitted for this question".to_string(),
            ));
        }
        if exam.hints_used != record.expected_hints_used {
            return Err(Error::InvalidState(
                "A hint was taken while the answer was being graded".to_string(),
            ));
        }
        exam.current_index += 1;
        exam.total_score += record.submission.score;
        if exam.current_index >= exam.total_questions {
            exam.status = ExamStatus::Completed.to_string();
            exam.completed_at = Some(now);
        }
        let exam = exam.clone();

        let submission = record.submission.into_row(now);
        tables.submissions.push(submission.clone());

        let next_question = match record.next_question {
            Some(question) if !exam.is_completed() => {
                let row = question.into_row(now);
                tables.questions.push(row.clone());
                Some(row)
            }
            _ => None,
        };

        Ok(RecordedAnswer {
            exam,
            submission,
            next_question,
        })
    }

    async fn ping(&self) -> bool {
        self.tables.lock().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{Category, Difficulty, Mode, QuestionType, Topic};
    use crate::models::question::GeneratedQuestion;
    use crate::models::submission::NewSubmission;
    use rust_decimal::Decimal;

    fn generated(text: &str) -> GeneratedQuestion {
        GeneratedQuestion {
            topic: Topic::Sql,
            difficulty: Difficulty::Medium,
            category: Category::Concept,
            question_type: QuestionType::Written,
            question_text: text.to_string(),
            correct_answer: "An index speeds up lookups.".to_string(),
            explanation: None,
            options: None,
            code_snippet: None,
        }
    }

    fn new_exam(total: i32) -> NewExam {
        NewExam {
            id: Uuid::new_v4(),
            topic: Topic::Sql,
            difficulty: Difficulty::Medium,
            category: Category::Concept,
            mode: Mode::Practice,
            question_type: QuestionType::Written,
            total_questions: total,
            time_limit_seconds: None,
        }
    }

    fn submission(exam_id: Uuid, question_id: Uuid, score: i64) -> NewSubmission {
        NewSubmission {
            id: Uuid::new_v4(),
            exam_id,
            question_id,
            student_answer: "answer".to_string(),
            raw_score: Decimal::from(score),
            hint_penalty: Decimal::ZERO,
            score: Decimal::from(score),
            passed: score >= 5,
            grade_letter: "B".to_string(),
            feedback: String::new(),
            mistakes: Vec::new(),
            strengths: Vec::new(),
            recommendations: Vec::new(),
            encouragement: String::new(),
        }
    }

    #[tokio::test]
    async fn stale_answer_is_rejected_without_side_effects() {
        let store = MemoryExamStore::new();
        let exam = new_exam(2);
        let exam_id = exam.id;
        let (_, first) = store
            .create_exam(exam, generated("What is an index?").into_new(exam_id, 1))
            .await
            .unwrap();

        let record = AnswerRecord {
            exam_id,
            expected_index: 0,
            expected_hints_used: 0,
            submission: submission(exam_id, first.id, 8),
            next_question: Some(generated("What is a view?").into_new(exam_id, 2)),
        };
        let recorded = store.record_answer(record.clone()).await.unwrap();
        assert_eq!(recorded.exam.current_index, 1);
        assert_eq!(recorded.next_question.unwrap().position, 2);

        let err = store.record_answer(record).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(store.list_submissions(exam_id).await.unwrap().len(), 1);
        assert_eq!(store.list_questions(exam_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn final_answer_completes_exam() {
        let store = MemoryExamStore::new();
        let exam = new_exam(1);
        let exam_id = exam.id;
        let (_, first) = store
            .create_exam(exam, generated("What is an index?").into_new(exam_id, 1))
            .await
            .unwrap();

        let recorded = store
            .record_answer(AnswerRecord {
                exam_id,
                expected_index: 0,
                expected_hints_used: 0,
                submission: submission(exam_id, first.id, 7),
                next_question: None,
            })
            .await
            .unwrap();
        assert!(recorded.exam.is_completed());
        assert!(recorded.exam.completed_at.is_some());
        assert_eq!(recorded.exam.total_score, Decimal::from(7));
    }

    #[tokio::test]
    async fn duplicate_hint_level_is_rejected() {
        let store = MemoryExamStore::new();
        let exam = new_exam(1);
        let exam_id = exam.id;
        let (_, first) = store
            .create_exam(exam, generated("What is an index?").into_new(exam_id, 1))
            .await
            .unwrap();

        let hint = NewHint {
            id: Uuid::new_v4(),
            exam_id,
            question_id: first.id,
            expected_index: 0,
            level: 1,
            hint_text: "Think about lookups.".to_string(),
        };
        let (exam, _) = store.record_hint(hint.clone()).await.unwrap();
        assert_eq!(exam.hints_used, 1);

        let err = store
            .record_hint(NewHint { id: Uuid::new_v4(), ..hint })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(store.get_exam(exam_id).await.unwrap().hints_used, 1);
    }

    #[tokio::test]
    async fn answer_graded_before_a_hint_is_rejected() {
        let store = MemoryExamStore::new();
        let exam = new_exam(1);
        let exam_id = exam.id;
        let (_, first) = store
            .create_exam(exam, generated("What is an index?").into_new(exam_id, 1))
            .await
            .unwrap();

        store
            .record_hint(NewHint {
                id: Uuid::new_v4(),
                exam_id,
                question_id: first.id,
                expected_index: 0,
                level: 1,
                hint_text: "Think about lookups.".to_string(),
            })
            .await
            .unwrap();

        let err = store
            .record_answer(AnswerRecord {
                exam_id,
                expected_index: 0,
                expected_hints_used: 0,
                submission: submission(exam_id, first.id, 10),
                next_question: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        let exam = store.get_exam(exam_id).await.unwrap();
        assert_eq!(exam.current_index, 0);
        assert_eq!(exam.total_score, Decimal::ZERO);
        assert!(store.list_submissions(exam_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_exam_is_not_found() {
        let store = MemoryExamStore::new();
        let err = tokio_test::assert_err!(store.get_exam(Uuid::new_v4()).await);
        assert!(matches!(err, Error::NotFound(_)));
        tokio_test::assert_ok!(store.list_exams().await);
    }
}
