use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::store::{AnswerRecord, ExamStore, RecordedAnswer};
use crate::error::{Error, Result};
use crate::models::catalog::ExamStatus;
use crate::models::exam::{Exam, NewExam};
use crate::models::hint::{Hint, NewHint};
use crate::models::question::{NewQuestion, Question};
use crate::models::submission::{NewSubmission, Submission};

const INSERT_QUESTION: &str = r#"
    INSERT INTO questions (
        id, exam_id, position, topic, difficulty, category, question_type,
        question_text, correct_answer, explanation, options, code_snippet, created_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    RETURNING *
"#;

#[derive(Clone)]
pub struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Duplicate rows mean another request already advanced the exam.
fn conflict_as_stale(err: sqlx::Error, what: &str) -> Error {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::InvalidState(format!("{} was already recorded", what))
        }
        other => Error::from(other),
    }
}

async fn insert_question<'c, E>(executor: E, question: NewQuestion) -> Result<Question>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    let options = question.options_json();
    let q = &question.question;
    let row = sqlx::query_as::<_, Question>(INSERT_QUESTION)
        .bind(question.id)
        .bind(question.exam_id)
        .bind(question.position)
        .bind(q.topic.as_str())
        .bind(q.difficulty.as_str())
        .bind(q.category.as_str())
        .bind(q.question_type.as_str())
        .bind(&q.question_text)
        .bind(&q.correct_answer)
        .bind(&q.explanation)
        .bind(options)
        .bind(&q.code_snippet)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
        .map_err(|e| conflict_as_stale(e, "question"))?;
    Ok(row)
}

async fn insert_submission<'c, E>(executor: E, submission: NewSubmission) -> Result<Submission>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    let row = submission.into_row(Utc::now());
    let stored = sqlx::query_as::<_, Submission>(
        r#"
        INSERT INTO submissions (
            id, exam_id, question_id, student_answer, raw_score, hint_penalty, score,
            passed, grade_letter, feedback, mistakes, strengths, recommendations,
            encouragement, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(row.id)
    .bind(row.exam_id)
    .bind(row.question_id)
    .bind(&row.student_answer)
    .bind(row.raw_score)
    .bind(row.hint_penalty)
    .bind(row.score)
    .bind(row.passed)
    .bind(&row.grade_letter)
    .bind(&row.feedback)
    .bind(&row.mistakes)
    .bind(&row.strengths)
    .bind(&row.recommendations)
    .bind(&row.encouragement)
    .bind(row.created_at)
    .fetch_one(executor)
    .await
    .map_err(|e| conflict_as_stale(e, "answer for this question"))?;
    Ok(stored)
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn create_exam(&self, exam: NewExam, first_question: NewQuestion) -> Result<(Exam, Question)> {
        let mut tx = self.pool.begin().await?;

        let exam = sqlx::query_as::<_, Exam>(
            r#"
            INSERT INTO exams (
                id, topic, difficulty, category, mode, question_type, total_questions,
                current_index, hints_used, time_limit_seconds, status, total_score, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, $8, $9, 0, $10)
            RETURNING *
            "#,
        )
        .bind(exam.id)
        .bind(exam.topic.as_str())
        .bind(exam.difficulty.as_str())
        .bind(exam.category.as_str())
        .bind(exam.mode.as_str())
        .bind(exam.question_type.as_str())
        .bind(exam.total_questions)
        .bind(exam.time_limit_seconds)
        .bind(ExamStatus::InProgress.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let question = insert_question(&mut *tx, first_question).await?;
        tx.commit().await?;

        Ok((exam, question))
    }

    async fn get_exam(&self, exam_id: Uuid) -> Result<Exam> {
        sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = $1")
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Exam {} not found", exam_id)))
    }

    async fn list_exams(&self) -> Result<Vec<Exam>> {
        let rows = sqlx::query_as::<_, Exam>("SELECT * FROM exams ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_question_at(&self, exam_id: Uuid, position: i32) -> Result<Question> {
        sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE exam_id = $1 AND position = $2")
            .bind(exam_id)
            .bind(position)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("Question {} of exam {} not found", position, exam_id))
            })
    }

    async fn list_questions(&self, exam_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, Question>(
            "SELECT * FROM questions WHERE exam_id = $1 ORDER BY position",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_submissions(&self, exam_id: Uuid) -> Result<Vec<Submission>> {
        let rows = sqlx::query_as::<_, Submission>(
            "SELECT * FROM submissions WHERE exam_id = $1 ORDER BY created_at",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn hints_for_question(&self, question_id: Uuid) -> Result<Vec<Hint>> {
        let rows = sqlx::query_as::<_, Hint>(
            "SELECT * FROM hints WHERE question_id = $1 ORDER BY level",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn record_hint(&self, hint: NewHint) -> Result<(Exam, Hint)> {
        let mut tx = self.pool.begin().await?;

        let exam = sqlx::query_as::<_, Exam>(
            r#"
            UPDATE exams SET hints_used = hints_used + 1
            WHERE id = $1 AND current_index = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(hint.exam_id)
        .bind(hint.expected_index)
        .bind(ExamStatus::InProgress.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::InvalidState("Exam moved on before the hint was stored".to_string()))?;

        let stored = sqlx::query_as::<_, Hint>(
            r#"
            INSERT INTO hints (id, exam_id, question_id, level, hint_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(hint.id)
        .bind(hint.exam_id)
        .bind(hint.question_id)
        .bind(hint.level)
        .bind(&hint.hint_text)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_as_stale(e, "hint at this level"))?;

        tx.commit().await?;
        Ok((exam, stored))
    }

    async fn record_answer(&self, record: AnswerRecord) -> Result<RecordedAnswer> {
        let mut tx = self.pool.begin().await?;

        let exam = sqlx::query_as::<_, Exam>(
            r#"
            UPDATE exams SET
                current_index = current_index + 1,
                total_score = total_score + $3,
                status = CASE WHEN current_index + 1 >= total_questions THEN $5 ELSE status END,
                completed_at = CASE WHEN current_index + 1 >= total_questions THEN $6 ELSE completed_at END
            WHERE id = $1 AND current_index = $2 AND status = $4 AND hints_used = $7
            RETURNING *
            "#,
        )
        .bind(record.exam_id)
        .bind(record.expected_index)
        .bind(record.submission.score)
        .bind(ExamStatus::InProgress.as_str())
        .bind(ExamStatus::Completed.as_str())
        .bind(Utc::now())
        .bind(record.expected_hints_used)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            Error::InvalidState("Exam changed while the answer was being graded".to_string())
        })?;

        let submission = insert_submission(&mut *tx, record.submission).await?;

        let next_question = match record.next_question {
            Some(question) if !exam.is_completed() => Some(insert_question(&mut *tx, question).await?),
            _ => None,
        };

        tx.commit().await?;
        Ok(RecordedAnswer {
            exam,
            submission,
            next_question,
        })
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
