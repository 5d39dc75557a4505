use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::database::{AnswerRecord, ExamStore};
use crate::dto::exam_dto::{
    ExamDetailResponse, ExamListItem, ExamQuestionDetail, ExamSummary, HintRequest, HintResponse,
    QuestionResult, StartExamRequest, StartExamResponse, SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::error::{Error, Result};
use crate::models::catalog::{QuestionType, Topic};
use crate::models::exam::{Exam, NewExam};
use crate::models::hint::NewHint;
use crate::models::question::Question;
use crate::models::submission::{NewSubmission, Submission};
use crate::services::grading_service::{lexical_fallback, GradeRequest, GradingService};
use crate::services::hint_service::{HintContext, HintService};
use crate::services::inference_service::TextGenerator;
use crate::services::question_service::{QuestionService, QuestionSpec};
use crate::services::scoring::{
    apply_hint_penalty, hint_penalty_points, max_question_score, penalty_fraction,
    question_grade_letter, summarize, to_f64, MAX_HINTS_PER_QUESTION,
};

/// Exam ids arrive as strings; anything unparsable is simply an unknown exam.
fn parse_exam_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::NotFound(format!("Exam {} not found", raw)))
}

fn spec_for(exam: &Exam) -> Result<QuestionSpec> {
    Ok(QuestionSpec {
        topic: exam.topic.parse()?,
        difficulty: exam.difficulty.parse()?,
        category: exam.category.parse()?,
        question_type: exam.question_type.parse()?,
    })
}

#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn ExamStore>,
    questions: QuestionService,
    grader: GradingService,
    hints: HintService,
    default_questions: u32,
}

impl ExamService {
    pub fn new(store: Arc<dyn ExamStore>, generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        Self {
            store,
            questions: QuestionService::new(generator.clone(), config.models.generator.clone()),
            grader: GradingService::new(
                generator.clone(),
                config.grading_mode,
                config.max_retries,
                config.models.clone(),
            ),
            hints: HintService::new(generator, config.models.generator.clone()),
            default_questions: config.default_exam_questions,
        }
    }

    pub async fn start_exam(&self, req: StartExamRequest) -> Result<StartExamResponse> {
        req.validate()?;

        let total_questions = req.num_questions.unwrap_or(self.default_questions) as i32;
        let time_limit_seconds = req.time_limit_seconds.or(req.mode.default_time_limit());
        let spec = QuestionSpec {
            topic: req.topic,
            difficulty: req.difficulty,
            category: req.category,
            question_type: req.question_type,
        };

        let first = self.questions.generate_question(&spec, &[]).await?;

        let exam_id = Uuid::new_v4();
        let new_exam = NewExam {
            id: exam_id,
            topic: req.topic,
            difficulty: req.difficulty,
            category: req.category,
            mode: req.mode,
            question_type: req.question_type,
            total_questions,
            time_limit_seconds,
        };
        let (exam, question) = self
            .store
            .create_exam(new_exam, first.into_new(exam_id, 1))
            .await?;

        tracing::info!(
            exam_id = %exam.id,
            topic = %req.topic,
            mode = %req.mode,
            total_questions,
            "exam started"
        );

        Ok(StartExamResponse {
            exam_id: exam.id,
            total_questions: exam.total_questions,
            current_index: 1,
            mode: req.mode,
            time_limit_seconds: exam.time_limit_seconds,
            question: question.view(),
        })
    }

    pub async fn submit_answer(&self, req: SubmitAnswerRequest) -> Result<SubmitAnswerResponse> {
        req.validate()?;
        let exam_id = parse_exam_id(&req.exam_id)?;
        let answer = req.answer.trim();
        if answer.is_empty() {
            return Err(Error::BadRequest("Answer must not be blank".to_string()));
        }

        let exam = self.store.get_exam(exam_id).await?;
        let position = exam
            .pending_position()
            .ok_or_else(|| Error::InvalidState("Exam is already completed".to_string()))?;
        let question = self.store.get_question_at(exam_id, position).await?;
        let hints_taken = self.store.hints_for_question(question.id).await?.len() as u32;

        let question_type: QuestionType = question.question_type.parse()?;
        let options = question.choice_options();
        let grade_request = GradeRequest {
            question_type,
            question_text: &question.question_text,
            correct_answer: &question.correct_answer,
            student_answer: answer,
            options: options.as_ref(),
        };
        let graded = match self.grader.grade(&grade_request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(exam_id = %exam_id, position, error = %e, "grading failed, using word-overlap score");
                lexical_fallback(answer, &question.correct_answer)
            }
        };

        let hint_penalty = hint_penalty_points(hints_taken);
        let score = apply_hint_penalty(graded.score, hints_taken);

        let next_question = if exam.current_index + 1 < exam.total_questions {
            let previous: Vec<String> = self
                .store
                .list_questions(exam_id)
                .await?
                .into_iter()
                .map(|q| q.question_text)
                .collect();
            let generated = self
                .questions
                .generate_question(&spec_for(&exam)?, &previous)
                .await?;
            Some(generated.into_new(exam_id, position + 1))
        } else {
            None
        };

        let submission = NewSubmission {
            id: Uuid::new_v4(),
            exam_id,
            question_id: question.id,
            student_answer: answer.to_string(),
            raw_score: graded.score,
            hint_penalty,
            score,
            passed: graded.passed,
            grade_letter: question_grade_letter(score).to_string(),
            feedback: graded.feedback.clone(),
            mistakes: graded.mistakes.clone(),
            strengths: graded.strengths.clone(),
            recommendations: graded.recommendations.clone(),
            encouragement: graded.encouragement.clone(),
        };
        let recorded = self
            .store
            .record_answer(AnswerRecord {
                exam_id,
                expected_index: exam.current_index,
                expected_hints_used: exam.hints_used,
                submission,
                next_question,
            })
            .await?;

        let updated = recorded.exam;
        let exam_completed = updated.is_completed();
        let exam_summary = if exam_completed {
            tracing::info!(exam_id = %exam_id, total_score = %updated.total_score, "exam completed");
            let questions = self.store.list_questions(exam_id).await?;
            let submissions = self.store.list_submissions(exam_id).await?;
            Some(build_summary(&updated, &questions, &submissions)?)
        } else {
            None
        };

        Ok(SubmitAnswerResponse {
            is_correct: graded.passed,
            score: to_f64(score),
            max_score: to_f64(graded.max_score),
            hint_penalty: to_f64(hint_penalty),
            grade_letter: question_grade_letter(score).to_string(),
            feedback: graded.feedback,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            encouragement: graded.encouragement,
            mistakes: graded.mistakes,
            strengths: graded.strengths,
            recommendations: graded.recommendations,
            exam_completed,
            current_index: if exam_completed {
                updated.total_questions
            } else {
                updated.current_index + 1
            },
            total_questions: updated.total_questions,
            score_so_far: to_f64(updated.total_score),
            next_question: recorded.next_question.map(|q| q.view()),
            exam_summary,
        })
    }

    pub async fn request_hint(&self, req: HintRequest) -> Result<HintResponse> {
        let exam_id = parse_exam_id(&req.exam_id)?;
        let exam = self.store.get_exam(exam_id).await?;
        let position = exam
            .pending_position()
            .ok_or_else(|| Error::InvalidState("Exam is already completed".to_string()))?;

        let mode = exam.mode()?;
        if !mode.hints_enabled() {
            return Err(Error::HintsDisabled(mode.display_name().to_string()));
        }

        let question = self.store.get_question_at(exam_id, position).await?;
        let previous: Vec<String> = self
            .store
            .hints_for_question(question.id)
            .await?
            .into_iter()
            .map(|h| h.hint_text)
            .collect();
        if previous.len() as u32 >= MAX_HINTS_PER_QUESTION {
            return Err(Error::HintsExhausted(MAX_HINTS_PER_QUESTION));
        }
        let level = previous.len() as u32 + 1;

        let hint_text = self
            .hints
            .generate_hint(&HintContext {
                question_text: &question.question_text,
                correct_answer: &question.correct_answer,
                code_snippet: question.code_snippet.as_deref(),
                category: question.category.parse()?,
                level,
                previous_hints: &previous,
            })
            .await;

        let (exam, hint) = self
            .store
            .record_hint(NewHint {
                id: Uuid::new_v4(),
                exam_id,
                question_id: question.id,
                expected_index: exam.current_index,
                level: level as i32,
                hint_text,
            })
            .await?;

        tracing::info!(exam_id = %exam_id, position, level, "hint issued");

        Ok(HintResponse {
            hint: hint.hint_text,
            hints_used: exam.hints_used,
            hint_level: hint.level,
            score_penalty: to_f64(penalty_fraction(level)),
        })
    }

    pub async fn get_exam(&self, raw_id: &str) -> Result<ExamDetailResponse> {
        let exam_id = parse_exam_id(raw_id)?;
        let exam = self.store.get_exam(exam_id).await?;
        let questions = self.store.list_questions(exam_id).await?;
        let submissions: HashMap<Uuid, Submission> = self
            .store
            .list_submissions(exam_id)
            .await?
            .into_iter()
            .map(|s| (s.question_id, s))
            .collect();

        let mut details = Vec::with_capacity(questions.len());
        for question in questions {
            let hints = self
                .store
                .hints_for_question(question.id)
                .await?
                .into_iter()
                .map(|h| h.hint_text)
                .collect();
            let answered = submissions.get(&question.id);
            let options = question.choice_options();
            details.push(ExamQuestionDetail {
                position: question.position,
                question_text: question.question_text,
                question_type: question.question_type,
                options,
                code_snippet: question.code_snippet,
                pending: answered.is_none(),
                hints,
                student_answer: answered.map(|s| s.student_answer.clone()),
                correct_answer: answered.map(|_| question.correct_answer),
                score: answered.map(|s| to_f64(s.score)),
                is_correct: answered.map(|s| s.passed),
                feedback: answered.map(|s| s.feedback.clone()),
            });
        }

        Ok(ExamDetailResponse {
            exam_id: exam.id,
            topic: exam.topic.parse()?,
            difficulty: exam.difficulty.parse()?,
            question_type: exam.question_type.parse()?,
            category: exam.category.parse()?,
            mode: exam.mode()?,
            total_questions: exam.total_questions,
            current_index: exam.current_index,
            score_total: to_f64(exam.total_score),
            hints_used: exam.hints_used,
            time_limit_seconds: exam.time_limit_seconds,
            status: exam.status.clone(),
            phase: exam.phase(),
            questions: details,
            created_at: exam.created_at,
            completed_at: exam.completed_at,
        })
    }

    pub async fn list_exams(&self) -> Result<Vec<ExamListItem>> {
        self.store
            .list_exams()
            .await?
            .into_iter()
            .map(|exam| -> Result<ExamListItem> {
                let summary = summarize(&[exam.total_score], exam.total_questions);
                Ok(ExamListItem {
                    exam_id: exam.id,
                    topic: exam.topic.parse()?,
                    difficulty: exam.difficulty.parse()?,
                    question_type: exam.question_type.parse()?,
                    category: exam.category.parse()?,
                    mode: exam.mode()?,
                    total_questions: exam.total_questions,
                    score_total: to_f64(exam.total_score),
                    hints_used: exam.hints_used,
                    status: exam.status,
                    percentage: summary.percentage,
                    grade_letter: summary.grade_letter.to_string(),
                    created_at: exam.created_at,
                    completed_at: exam.completed_at,
                })
            })
            .collect()
    }
}

fn build_summary(exam: &Exam, questions: &[Question], submissions: &[Submission]) -> Result<ExamSummary> {
    let by_question: HashMap<Uuid, &Submission> =
        submissions.iter().map(|s| (s.question_id, s)).collect();
    let scores: Vec<Decimal> = submissions.iter().map(|s| s.score).collect();
    let summary = summarize(&scores, exam.total_questions);
    let topic: Topic = exam.topic.parse()?;

    let results = questions
        .iter()
        .filter_map(|q| {
            by_question.get(&q.id).map(|s| QuestionResult {
                position: q.position,
                question_text: q.question_text.clone(),
                correct_answer: q.correct_answer.clone(),
                student_answer: s.student_answer.clone(),
                score: to_f64(s.score),
                is_correct: s.passed,
                feedback: s.feedback.clone(),
            })
        })
        .collect();

    Ok(ExamSummary {
        exam_id: exam.id,
        topic,
        difficulty: exam.difficulty.parse()?,
        total_questions: exam.total_questions,
        total_score: to_f64(summary.total_score),
        max_score: to_f64(max_question_score() * Decimal::from(exam.total_questions)),
        percentage: summary.percentage,
        grade_letter: summary.grade_letter.to_string(),
        passed: summary.passed,
        hints_used: exam.hints_used,
        questions: results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GradingMode;
    use crate::database::MemoryExamStore;
    use crate::models::catalog::{Category, Difficulty, Mode};
    use crate::services::inference_service::MockTextGenerator;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers by prompt shape: question generation, hints, then grading.
    fn scripted(scores: Vec<f64>, hint_prompts: Arc<Mutex<Vec<String>>>) -> MockTextGenerator {
        let generated = AtomicUsize::new(0);
        let graded = AtomicUsize::new(0);
        let mut mock = MockTextGenerator::new();
        mock.expect_generate().returning(move |req| {
            if req.prompt.starts_with("Generate") {
                let n = generated.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({
                    "question_text": format!("Question number {}?", n),
                    "correct_answer": "a hash table maps keys to buckets",
                    "explanation": "Hashing gives constant time lookups."
                })
                .to_string())
            } else if req.prompt.starts_with("A student is working") {
                let mut seen = hint_prompts.lock().unwrap();
                seen.push(req.prompt.clone());
                Ok(json!({ "hint": format!("Hint {}", seen.len()) }).to_string())
            } else {
                let i = graded.fetch_add(1, Ordering::SeqCst);
                let score = scores.get(i).copied().unwrap_or(0.0);
                Ok(json!({ "score": score, "feedback": "Graded." }).to_string())
            }
        });
        mock
    }

    fn service(mock: MockTextGenerator) -> ExamService {
        let config = Config {
            grading_mode: GradingMode::Single,
            ..Config::default()
        };
        ExamService::new(Arc::new(MemoryExamStore::new()), Arc::new(mock), &config)
    }

    fn start_request(mode: Mode, num_questions: u32) -> StartExamRequest {
        StartExamRequest {
            topic: Topic::DataStructures,
            difficulty: Difficulty::Medium,
            num_questions: Some(num_questions),
            question_type: QuestionType::Written,
            category: Category::Concept,
            mode,
            time_limit_seconds: None,
        }
    }

    fn answer(exam_id: Uuid, text: &str) -> SubmitAnswerRequest {
        SubmitAnswerRequest {
            exam_id: exam_id.to_string(),
            answer: text.to_string(),
        }
    }

    #[tokio::test]
    async fn full_exam_accumulates_scores_and_completes() {
        let svc = service(scripted(vec![8.0, 6.0, 10.0], Arc::default()));
        let started = svc.start_exam(start_request(Mode::Practice, 3)).await.unwrap();
        assert_eq!(started.current_index, 1);
        assert_eq!(started.total_questions, 3);
        assert_eq!(started.time_limit_seconds, None);
        assert_eq!(started.question.position, 1);

        let first = svc.submit_answer(answer(started.exam_id, "buckets")).await.unwrap();
        assert!(!first.exam_completed);
        assert_eq!(first.current_index, 2);
        assert_eq!(first.score, 8.0);
        assert_eq!(first.next_question.as_ref().unwrap().question_text, "Question number 2?");

        let second = svc.submit_answer(answer(started.exam_id, "keys")).await.unwrap();
        assert_eq!(second.current_index, 3);
        assert_eq!(second.score_so_far, 14.0);

        let last = svc.submit_answer(answer(started.exam_id, "hashing")).await.unwrap();
        assert!(last.exam_completed);
        assert_eq!(last.current_index, 3);
        assert!(last.next_question.is_none());
        let summary = last.exam_summary.unwrap();
        assert_eq!(summary.percentage, 80.0);
        assert_eq!(summary.grade_letter, "B");
        assert!(summary.passed);
        assert_eq!(summary.questions.len(), 3);

        let err = svc
            .submit_answer(answer(started.exam_id, "again"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        let detail = svc.get_exam(&started.exam_id.to_string()).await.unwrap();
        assert_eq!(detail.current_index, 3);
        assert!(detail.questions.iter().all(|q| !q.pending));
        assert_eq!(detail.questions[2].correct_answer.as_deref(), Some("a hash table maps keys to buckets"));
    }

    #[tokio::test]
    async fn hints_escalate_and_cost_points() {
        let prompts: Arc<Mutex<Vec<String>>> = Arc::default();
        let svc = service(scripted(vec![9.0], prompts.clone()));
        let started = svc.start_exam(start_request(Mode::Practice, 1)).await.unwrap();
        let hint_req = || HintRequest {
            exam_id: started.exam_id.to_string(),
        };

        for level in 1..=3 {
            let hint = svc.request_hint(hint_req()).await.unwrap();
            assert_eq!(hint.hint_level, level);
            assert_eq!(hint.hints_used, level);
            assert_eq!(hint.hint, format!("Hint {}", level));
        }
        let err = svc.request_hint(hint_req()).await.unwrap_err();
        assert!(matches!(err, Error::HintsExhausted(3)));

        let seen = prompts.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert!(seen[1].contains("1. Hint 1"));
        assert!(seen[2].contains("1. Hint 1") && seen[2].contains("2. Hint 2"));

        let graded = svc.submit_answer(answer(started.exam_id, "buckets")).await.unwrap();
        assert_eq!(graded.hint_penalty, 4.5);
        assert_eq!(graded.score, 4.5);
        assert!(graded.exam_completed);
    }

    #[tokio::test]
    async fn hint_penalty_fraction_is_cumulative() {
        let svc = service(scripted(vec![], Arc::default()));
        let started = svc.start_exam(start_request(Mode::Mock, 2)).await.unwrap();
        assert_eq!(started.time_limit_seconds, Some(420));

        let req = HintRequest {
            exam_id: started.exam_id.to_string(),
        };
        assert_eq!(svc.request_hint(req.clone()).await.unwrap().score_penalty, 0.15);
        assert_eq!(svc.request_hint(req).await.unwrap().score_penalty, 0.3);
    }

    #[tokio::test]
    async fn timed_exams_refuse_hints() {
        let svc = service(scripted(vec![], Arc::default()));
        let started = svc.start_exam(start_request(Mode::Timed, 3)).await.unwrap();
        assert_eq!(started.time_limit_seconds, Some(300));

        let err = svc
            .request_hint(HintRequest {
                exam_id: started.exam_id.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HintsDisabled(_)));
    }

    #[tokio::test]
    async fn explicit_time_limit_wins_over_mode_default() {
        let svc = service(scripted(vec![], Arc::default()));
        let mut req = start_request(Mode::Timed, 1);
        req.time_limit_seconds = Some(90);
        let started = svc.start_exam(req).await.unwrap();
        assert_eq!(started.time_limit_seconds, Some(90));
    }

    #[tokio::test]
    async fn malformed_or_unknown_ids_are_not_found() {
        let svc = service(scripted(vec![], Arc::default()));
        let err = svc.submit_answer(answer(Uuid::new_v4(), "x")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = svc
            .submit_answer(SubmitAnswerRequest {
                exam_id: "not-a-uuid".to_string(),
                answer: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = svc.get_exam("42").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_next_question_persists_nothing() {
        let mut mock = MockTextGenerator::new();
        let calls = AtomicUsize::new(0);
        mock.expect_generate().returning(move |req| {
            if req.prompt.starts_with("Generate") {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(r#"{"question_text": "First?", "correct_answer": "yes"}"#.to_string())
                } else {
                    Ok("no json at all".to_string())
                }
            } else {
                Ok(r#"{"score": 7}"#.to_string())
            }
        });
        let svc = service(mock);
        let started = svc.start_exam(start_request(Mode::Practice, 2)).await.unwrap();

        let err = svc.submit_answer(answer(started.exam_id, "yes")).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));

        let detail = svc.get_exam(&started.exam_id.to_string()).await.unwrap();
        assert_eq!(detail.current_index, 0);
        assert_eq!(detail.questions.len(), 1);
        assert!(detail.questions[0].pending);
        assert!(detail.questions[0].correct_answer.is_none());
    }

    #[tokio::test]
    async fn unusable_grades_fall_back_to_word_overlap() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate().returning(|req| {
            if req.prompt.starts_with("Generate") {
                Ok(r#"{"question_text": "What is a set?", "correct_answer": "an unordered collection of unique items"}"#.to_string())
            } else {
                Ok("I refuse to grade".to_string())
            }
        });
        let svc = service(mock);
        let started = svc.start_exam(start_request(Mode::Practice, 1)).await.unwrap();

        let graded = svc
            .submit_answer(answer(started.exam_id, "an unordered collection of unique items"))
            .await
            .unwrap();
        assert_eq!(graded.score, 10.0);
        assert!(graded.exam_completed);

        let listed = svc.list_exams().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].percentage, 100.0);
        assert_eq!(listed[0].grade_letter, "A");
    }
}
