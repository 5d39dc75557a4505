use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{GradingMode, ModelOverrides};
use crate::error::{Error, Result};
use crate::models::catalog::QuestionType;
use crate::models::question::ChoiceOptions;
use crate::models::submission::{Mistake, Recommendation};
use crate::services::inference_service::{generate_json, GenerateRequest, TextGenerator};
use crate::services::scoring::{
    clamp_score, max_question_score, question_grade_letter, question_passed, to_f64,
};
use crate::utils::llm_json::{decode_json, number_field, string_field};

const SINGLE_SYSTEM: &str = r#"You are a strict exam grading assistant.
Respond with ONLY a valid JSON object. No markdown, no code fences, no extra text.

The JSON must follow this schema:
{
  "score": number between 0.0 and 10.0,
  "mistakes": [ { "type": string, "description": string } ],
  "strengths": [ string ],
  "feedback": string (1-2 sentence summary),
  "recommendations": [ { "topic": string, "action": string, "resource_type": "practice" | "reading" | "video" | "exercise" } ],
  "encouragement": string (one warm, personal sentence)
}

Use an empty mistakes array for a perfect answer and an empty recommendations array when nothing needs improving."#;

const NOT_JSON_REMINDER: &str =
    "\n\nYour previous response was not valid JSON. Return ONLY the JSON object, nothing else.";

const GRADER_SYSTEM: &str = "You are an experienced professor who has graded thousands of \
exams. You judge accuracy and completeness only and never write feedback or encouragement. \
Respond with ONLY a JSON object.";

const FEEDBACK_SYSTEM: &str = "You are a caring but thorough teaching assistant. You pinpoint \
where a student went wrong, acknowledge what they got right and suggest targeted study \
actions. You are constructive, never harsh. Respond with ONLY a JSON object.";

const REVIEW_SYSTEM: &str = "You are a senior educator who checks that scores match feedback \
and closes every review with genuine, specific encouragement. Respond with ONLY a JSON object.";

const FEEDBACK_SCHEMA: &str = r#"{"mistakes": [{"type": "<conceptual|factual|incomplete|irrelevant>", "description": "<specific mistake>"}], "strengths": ["<specific strength>"], "feedback": "<1-2 sentence summary>", "recommendations": [{"topic": "<topic>", "action": "<what to do>", "resource_type": "<practice|reading|video|exercise>"}]}"#;

pub struct GradeRequest<'a> {
    pub question_type: QuestionType,
    pub question_text: &'a str,
    pub correct_answer: &'a str,
    pub student_answer: &'a str,
    pub options: Option<&'a ChoiceOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeResult {
    pub score: Decimal,
    pub max_score: Decimal,
    pub grade_letter: String,
    pub passed: bool,
    pub mistakes: Vec<Mistake>,
    pub strengths: Vec<String>,
    pub feedback: String,
    pub recommendations: Vec<Recommendation>,
    pub encouragement: String,
}

impl GradeResult {
    fn scored(score: Decimal) -> Self {
        Self {
            score,
            max_score: max_question_score(),
            grade_letter: question_grade_letter(score).to_string(),
            passed: question_passed(score),
            mistakes: Vec::new(),
            strengths: Vec::new(),
            feedback: String::new(),
            recommendations: Vec::new(),
            encouragement: String::new(),
        }
    }

    fn absorb_feedback(&mut self, obj: &Map<String, JsonValue>) {
        self.mistakes = list_field(obj, "mistakes");
        self.strengths = list_field(obj, "strengths");
        self.recommendations = list_field(obj, "recommendations");
        if let Some(feedback) = string_field(obj, "feedback") {
            self.feedback = feedback;
        }
    }
}

fn list_field<T: serde::de::DeserializeOwned>(obj: &Map<String, JsonValue>, key: &str) -> Vec<T> {
    obj.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Builds a result from a single-prompt reply. `None` when `score` is absent.
pub fn parse_single_reply(obj: &Map<String, JsonValue>) -> Option<GradeResult> {
    let score = clamp_score(number_field(obj, "score")?);
    let mut result = GradeResult::scored(score);
    result.absorb_feedback(obj);
    result.encouragement = string_field(obj, "encouragement").unwrap_or_default();
    Some(result)
}

/// Word-overlap score used when the model cannot grade at all.
pub fn lexical_fallback(student_answer: &str, correct_answer: &str) -> GradeResult {
    let words = |s: &str| -> HashSet<String> {
        s.split_whitespace().map(|w| w.to_lowercase()).collect()
    };
    let student = words(student_answer);
    let correct = words(correct_answer);
    let similarity = if student.is_empty() || correct.is_empty() {
        0.0
    } else {
        let overlap = student.intersection(&correct).count();
        overlap as f64 / student.len().max(correct.len()) as f64
    };

    let mut result = GradeResult::scored(clamp_score(similarity * 10.0));
    result.feedback = format!(
        "Your answer received a score of {}/10 based on how closely it matches the model answer.",
        result.score
    );
    result.encouragement = "Keep learning and improving!".to_string();
    result
}

#[derive(Clone)]
pub struct GradingService {
    generator: Arc<dyn TextGenerator>,
    mode: GradingMode,
    max_retries: u32,
    models: ModelOverrides,
}

impl GradingService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        mode: GradingMode,
        max_retries: u32,
        models: ModelOverrides,
    ) -> Self {
        Self {
            generator,
            mode,
            max_retries: max_retries.max(1),
            models,
        }
    }

    pub async fn grade(&self, request: &GradeRequest<'_>) -> Result<GradeResult> {
        match request.question_type {
            QuestionType::MultipleChoice => Ok(self.grade_choice(request).await),
            QuestionType::Written => self.grade_written(request).await,
        }
    }

    /// Choice scores are deterministic; the crew only writes the commentary.
    async fn grade_choice(&self, request: &GradeRequest<'_>) -> GradeResult {
        let chosen = request.student_answer.trim().to_ascii_uppercase();
        let correct = request.correct_answer.trim().to_ascii_uppercase();
        let is_correct = chosen == correct;
        let score = if is_correct { max_question_score() } else { Decimal::ZERO };

        let mut result = GradeResult::scored(score);
        result.feedback = if is_correct {
            "Correct!".to_string()
        } else {
            format!("The correct answer was {}.", correct)
        };
        if is_correct {
            result.strengths.push("Correct answer selected".to_string());
        } else {
            result.mistakes.push(Mistake {
                kind: "incorrect".to_string(),
                description: format!("Selected {} instead of {}", chosen, correct),
            });
        }
        result.encouragement = if is_correct {
            "Great job!".to_string()
        } else {
            "Keep studying, you'll get it next time!".to_string()
        };

        if self.mode == GradingMode::Crew {
            let option_text = |letter: &str| {
                request
                    .options
                    .and_then(|o| o.get(letter))
                    .cloned()
                    .unwrap_or_default()
            };
            let options_block = request
                .options
                .map(|o| {
                    o.iter()
                        .map(|(k, v)| format!("{}) {}", k, v))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default();
            let prompt = format!(
                "A student answered a multiple choice question. Give feedback on their choice.\n\n\
                 Question: {question}\nOptions:\n{options_block}\n\n\
                 Correct answer: {correct} ({correct_text})\n\
                 Student selected: {chosen} ({chosen_text})\n\
                 Result: {verdict}\n\n\
                 Explain why the correct option is right and, if the student was wrong, why their \
                 option is not. Respond with ONLY this JSON object:\n{FEEDBACK_SCHEMA}",
                question = request.question_text,
                correct_text = option_text(&correct),
                chosen_text = option_text(&chosen),
                verdict = if is_correct { "CORRECT" } else { "INCORRECT" },
            );
            match self.ask(prompt, FEEDBACK_SYSTEM, self.models.feedback.as_deref()).await {
                Ok(obj) => result.absorb_feedback(&obj),
                Err(e) => tracing::warn!(error = %e, "choice feedback call failed, keeping defaults"),
            }
            let answer = format!("{}) {}", chosen, option_text(&chosen));
            if let Some(text) = self.encouragement(request.question_text, &answer, &result).await {
                result.encouragement = text;
            }
        }

        result
    }

    async fn grade_written(&self, request: &GradeRequest<'_>) -> Result<GradeResult> {
        if self.mode == GradingMode::Crew {
            match self.grade_crew(request).await {
                Ok(result) => return Ok(result),
                Err(e) => tracing::warn!(error = %e, "crew grading failed, falling back to single prompt"),
            }
        }
        self.grade_single(request).await
    }

    /// grader -> feedback -> encouragement, each step seeing the earlier output.
    async fn grade_crew(&self, request: &GradeRequest<'_>) -> Result<GradeResult> {
        let grading_prompt = format!(
            "Compare the student answer to the correct answer for this exam question.\n\n\
             Question: {question}\nCorrect Answer: {correct}\nStudent Answer: {student}\n\n\
             Grading scale (0.0 - 10.0):\n\
             - 9.0 - 10.0: excellent, covers all key points\n\
             - 7.0 - 8.9: good, minor gaps\n\
             - 5.0 - 6.9: partial understanding, significant gaps\n\
             - 3.0 - 4.9: major misunderstandings\n\
             - 0.0 - 2.9: wrong or no understanding shown\n\n\
             Respond with ONLY a JSON object such as {{\"score\": 7.5}}.",
            question = request.question_text,
            correct = request.correct_answer,
            student = request.student_answer,
        );
        let graded = self
            .ask(grading_prompt, GRADER_SYSTEM, self.models.grader.as_deref())
            .await?;
        let raw = number_field(&graded, "score")
            .ok_or_else(|| Error::MalformedResponse("grader reply has no score".to_string()))?;
        let mut result = GradeResult::scored(clamp_score(raw));

        let feedback_prompt = format!(
            "The student has been graded on this question. Now give detailed feedback.\n\n\
             Question: {question}\nCorrect Answer: {correct}\nStudent Answer: {student}\n\
             Score: {score}/10 (Grade: {letter})\n\n\
             Use an empty mistakes array for a perfect answer. Be specific, not generic. \
             Respond with ONLY this JSON object:\n{FEEDBACK_SCHEMA}",
            question = request.question_text,
            correct = request.correct_answer,
            student = request.student_answer,
            score = result.score,
            letter = result.grade_letter,
        );
        match self
            .ask(feedback_prompt, FEEDBACK_SYSTEM, self.models.feedback.as_deref())
            .await
        {
            Ok(obj) => result.absorb_feedback(&obj),
            Err(e) => tracing::warn!(error = %e, "feedback step failed, keeping empty feedback"),
        }

        if let Some(text) = self
            .encouragement(request.question_text, request.student_answer, &result)
            .await
        {
            result.encouragement = text;
        }
        Ok(result)
    }

    async fn encouragement(
        &self,
        question: &str,
        student_answer: &str,
        result: &GradeResult,
    ) -> Option<String> {
        let prompt = format!(
            "Review this grading result and write encouragement for the student.\n\n\
             Question: {question}\nStudent Answer: {student_answer}\n\
             Score: {score}/10 (Grade: {letter}, Passed: {passed})\nFeedback: {feedback}\n\n\
             Celebrate a strong result, support a weak one, and mention something specific. \
             Respond with ONLY this JSON object: {{\"encouragement\": \"<1-2 warm sentences>\"}}",
            score = to_f64(result.score),
            letter = result.grade_letter,
            passed = result.passed,
            feedback = result.feedback,
        );
        match self.ask(prompt, REVIEW_SYSTEM, self.models.review.as_deref()).await {
            Ok(obj) => string_field(&obj, "encouragement"),
            Err(e) => {
                tracing::warn!(error = %e, "encouragement step failed");
                None
            }
        }
    }

    async fn grade_single(&self, request: &GradeRequest<'_>) -> Result<GradeResult> {
        let base = format!(
            "Question: {}\nCorrect Answer: {}\nStudent Answer: {}\n\n\
             Grade this student answer. Return ONLY the JSON object.",
            request.question_text, request.correct_answer, request.student_answer
        );
        let simplified = format!(
            "Grade this answer. Return JSON only:\n\
             {{\"score\": <0-10>, \"feedback\": \"<summary>\", \"encouragement\": \"<message>\"}}\n\n\
             Question: {}\nCorrect: {}\nStudent: {}",
            request.question_text, request.correct_answer, request.student_answer
        );

        let mut last_problem = String::new();
        for attempt in 0..self.max_retries {
            let prompt = match attempt {
                0 => base.clone(),
                1 => format!("{}{}", base, NOT_JSON_REMINDER),
                _ => simplified.clone(),
            };
            let request = GenerateRequest::new(prompt)
                .system(SINGLE_SYSTEM)
                .model(self.models.grader.as_deref())
                .temperature(0.2);

            let problem = match self.generator.generate(request).await {
                Ok(raw) => match decode_json(&raw).ok().and_then(|obj| parse_single_reply(&obj)) {
                    Some(result) => return Ok(result),
                    None => "reply had no usable JSON score".to_string(),
                },
                Err(Error::InferenceUnavailable(msg)) => {
                    return Err(Error::InferenceUnavailable(msg))
                }
                Err(e) => e.to_string(),
            };
            tracing::warn!(attempt = attempt + 1, problem = %problem, "single-prompt grading attempt failed");
            last_problem = problem;
        }

        Err(Error::Generation(format!(
            "grading failed after {} attempts: {}",
            self.max_retries, last_problem
        )))
    }

    async fn ask(
        &self,
        prompt: String,
        system: &str,
        model: Option<&str>,
    ) -> Result<Map<String, JsonValue>> {
        let request = GenerateRequest::new(prompt)
            .system(system)
            .model(model)
            .temperature(0.3);
        generate_json(self.generator.as_ref(), request).await
    }
}
