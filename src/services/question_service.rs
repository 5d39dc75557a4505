use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::catalog::{Category, Difficulty, QuestionType, Topic};
use crate::models::question::{ChoiceOptions, GeneratedQuestion, OPTION_LETTERS};
use crate::services::inference_service::{generate_json, GenerateRequest, TextGenerator};
use crate::utils::llm_json::string_field;

const GENERATOR_SYSTEM: &str = "You are a senior software engineer who has run hundreds of \
technical interviews. You write clear, unambiguous interview questions that have a definitive \
correct answer suitable for automatic grading. \
You respond with ONLY a valid JSON object: no markdown, no code fences, no commentary.";

const STRICT_SUFFIX: &str = "\n\nYour previous reply could not be used. Reply with exactly one \
JSON object containing the keys listed above, with non-empty string values. \
Do not wrap it in markdown and do not add any text before or after it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionSpec {
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub category: Category,
    pub question_type: QuestionType,
}

struct CategoryBrief {
    label: &'static str,
    ask: &'static str,
    answer_rule: &'static str,
    levels: [&'static str; 3],
    wants_snippet: bool,
}

fn category_brief(category: Category) -> CategoryBrief {
    match category {
        Category::Coding => CategoryBrief {
            label: "CODING",
            ask: "Ask the candidate to write a specific function, algorithm or short program. \
                  Include example inputs and expected outputs.",
            answer_rule: "correct_answer must be a complete, working code solution.",
            levels: [
                "simple logic with loops, conditions and basic operations",
                "data manipulation, standard algorithms, string processing",
                "complex algorithms, optimisation, advanced data structures",
            ],
            wants_snippet: false,
        },
        Category::Concept => CategoryBrief {
            label: "CONCEPT",
            ask: "Ask the candidate to explain a concept, compare ideas, or describe how \
                  something works internally.",
            answer_rule: "correct_answer must be a clear and complete explanation.",
            levels: [
                "basic definitions and fundamentals",
                "trade-offs, comparisons and internal mechanics",
                "deep technical knowledge, edge cases and advanced theory",
            ],
            wants_snippet: false,
        },
        Category::Debug => CategoryBrief {
            label: "DEBUG",
            ask: "Present buggy code containing one realistic, non-obvious bug and ask the \
                  candidate to find and fix it. The question_text must contain the code.",
            answer_rule: "correct_answer must name the bug and give the corrected code.",
            levels: [
                "syntax slips, off-by-one errors, wrong operators",
                "logic errors, unhandled edge cases, incorrect algorithms",
                "subtle bugs, race conditions, resource or memory issues",
            ],
            wants_snippet: true,
        },
        Category::SystemDesign => CategoryBrief {
            label: "SYSTEM DESIGN",
            ask: "Ask the candidate to design or architect a system, component or API.",
            answer_rule: "correct_answer must cover the key components, data flow and \
                          design decisions.",
            levels: [
                "a simple feature or class structure",
                "a small service, an API or a database schema",
                "large-scale or distributed systems with scalability concerns",
            ],
            wants_snippet: false,
        },
        Category::Behavioral => CategoryBrief {
            label: "BEHAVIORAL",
            ask: "Ask a technical behavioural question about past experience or how the \
                  candidate would handle a situation, grounded in the topic.",
            answer_rule: "correct_answer must list what a strong answer covers, in STAR form.",
            levels: [
                "teamwork, code review, helping colleagues",
                "technical disagreements, conflict, deadline pressure",
                "failing projects, hard technical calls, production incidents",
            ],
            wants_snippet: false,
        },
        Category::CodeReview => CategoryBrief {
            label: "CODE REVIEW",
            ask: "Present code with specific reviewable issues and ask the candidate to \
                  review it. The question_text must contain the code.",
            answer_rule: "correct_answer must list the issues and the suggested improvements.",
            levels: [
                "naming, formatting, missing error handling",
                "performance problems, code smells, SOLID violations",
                "architectural flaws, security vulnerabilities, subtle anti-patterns",
            ],
            wants_snippet: true,
        },
    }
}

fn level_index(difficulty: Difficulty) -> usize {
    match difficulty {
        Difficulty::Easy => 0,
        Difficulty::Medium => 1,
        Difficulty::Hard => 2,
    }
}

fn previous_block(previous: &[String]) -> String {
    if previous.is_empty() {
        "None".to_string()
    } else {
        previous
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn build_prompt(spec: &QuestionSpec, previous: &[String]) -> String {
    let topic = spec.topic.display_name();
    let difficulty = spec.difficulty.as_str();
    let brief = category_brief(spec.category);

    let body = match spec.question_type {
        QuestionType::MultipleChoice => format!(
            "Generate a {difficulty} MULTIPLE CHOICE interview question about {topic}.\n\
             Category: {category}\n\n\
             Requirements:\n\
             - Exactly four options labelled A, B, C and D, all plausible\n\
             - Exactly one option is the best answer\n\
             - Pitch it at this level: {level}\n\n\
             Respond with ONLY this JSON object:\n\
             {{\"question_text\": \"<the question>\", \"options\": {{\"A\": \"<option>\", \"B\": \"<option>\", \"C\": \"<option>\", \"D\": \"<option>\"}}, \"correct_answer\": \"<A, B, C or D>\", \"explanation\": \"<why it is correct, 1-2 sentences>\"}}",
            category = spec.category.display_name(),
            level = brief.levels[level_index(spec.difficulty)],
        ),
        QuestionType::Written => {
            let snippet_field = if brief.wants_snippet {
                ", \"code_snippet\": \"<the code on its own, for display>\""
            } else {
                ""
            };
            format!(
                "Generate a {difficulty} {label} interview question about {topic}.\n\n\
                 {ask}\n\n\
                 Requirements:\n\
                 - {answer_rule}\n\
                 - Pitch it at this level: {level}\n\n\
                 Respond with ONLY this JSON object:\n\
                 {{\"question_text\": \"<the question>\", \"correct_answer\": \"<the model answer>\"{snippet_field}, \"explanation\": \"<1-2 sentences>\"}}",
                label = brief.label,
                ask = brief.ask,
                answer_rule = brief.answer_rule,
                level = brief.levels[level_index(spec.difficulty)],
            )
        }
    };

    format!(
        "{body}\n\nDo NOT repeat any of these previously asked questions:\n{previous}\n\n\
         Return ONLY the JSON object. No markdown. No code blocks. No extra text.",
        previous = previous_block(previous),
    )
}

/// Validates a decoded reply. Multiple-choice options are reshuffled so the
/// correct letter is not always the one the model favours.
pub fn parse_question(
    spec: &QuestionSpec,
    obj: &Map<String, JsonValue>,
    rng: &mut impl Rng,
) -> std::result::Result<GeneratedQuestion, String> {
    let question_text =
        string_field(obj, "question_text").ok_or_else(|| "missing question_text".to_string())?;
    let mut correct_answer =
        string_field(obj, "correct_answer").ok_or_else(|| "missing correct_answer".to_string())?;
    let explanation = string_field(obj, "explanation");
    let code_snippet = string_field(obj, "code_snippet");

    let options = match spec.question_type {
        QuestionType::Written => None,
        QuestionType::MultipleChoice => {
            let raw = obj
                .get("options")
                .and_then(|v| v.as_object())
                .ok_or_else(|| "missing options object".to_string())?;
            let mut texts = Vec::with_capacity(OPTION_LETTERS.len());
            for letter in OPTION_LETTERS {
                let text = string_field(raw, letter)
                    .ok_or_else(|| format!("missing option {}", letter))?;
                texts.push(text);
            }
            if raw.len() != OPTION_LETTERS.len() {
                return Err(format!("expected 4 options, got {}", raw.len()));
            }
            let mut seen = HashSet::with_capacity(texts.len());
            if !texts.iter().all(|t| seen.insert(t.trim().to_lowercase())) {
                return Err("options must be distinct".to_string());
            }

            let letter = correct_answer
                .trim()
                .trim_end_matches(')')
                .trim_end_matches('.')
                .to_ascii_uppercase();
            let correct_idx = OPTION_LETTERS
                .iter()
                .position(|l| *l == letter)
                .ok_or_else(|| format!("correct_answer '{}' is not one of A-D", correct_answer))?;

            let mut order: Vec<usize> = (0..texts.len()).collect();
            order.shuffle(rng);
            let new_idx = order
                .iter()
                .position(|&i| i == correct_idx)
                .unwrap_or(correct_idx);
            correct_answer = OPTION_LETTERS[new_idx].to_string();

            let options: ChoiceOptions = OPTION_LETTERS
                .iter()
                .map(|l| l.to_string())
                .zip(order.into_iter().map(|i| texts[i].clone()))
                .collect();
            Some(options)
        }
    };

    Ok(GeneratedQuestion {
        topic: spec.topic,
        difficulty: spec.difficulty,
        category: spec.category,
        question_type: spec.question_type,
        question_text,
        correct_answer,
        explanation,
        options,
        code_snippet,
    })
}

#[derive(Clone)]
pub struct QuestionService {
    generator: Arc<dyn TextGenerator>,
    model: Option<String>,
}

impl QuestionService {
    pub fn new(generator: Arc<dyn TextGenerator>, model: Option<String>) -> Self {
        Self { generator, model }
    }

    /// Generates one question; retries once with a stricter prompt when the
    /// reply is unusable.
    pub async fn generate_question(
        &self,
        spec: &QuestionSpec,
        previous: &[String],
    ) -> Result<GeneratedQuestion> {
        let prompt = build_prompt(spec, previous);
        let attempts = [prompt.clone(), format!("{}{}", prompt, STRICT_SUFFIX)];
        let mut last_problem = String::new();

        for (attempt, prompt) in attempts.into_iter().enumerate() {
            let request = GenerateRequest::new(prompt)
                .system(GENERATOR_SYSTEM)
                .model(self.model.as_deref())
                .temperature(0.8);

            let problem = match generate_json(self.generator.as_ref(), request).await {
                Ok(obj) => match parse_question(spec, &obj, &mut StdRng::from_entropy()) {
                    Ok(question) => {
                        tracing::info!(
                            topic = %spec.topic,
                            category = %spec.category,
                            question_type = %spec.question_type,
                            attempt = attempt + 1,
                            "question generated"
                        );
                        return Ok(question);
                    }
                    Err(problem) => problem,
                },
                Err(Error::MalformedResponse(reason)) => reason,
                Err(other) => return Err(other),
            };

            tracing::warn!(attempt = attempt + 1, problem = %problem, "generated question rejected");
            last_problem = problem;
        }

        Err(Error::Generation(format!(
            "no usable question after retry: {}",
            last_problem
        )))
    }
}
