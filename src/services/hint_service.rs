use std::sync::Arc;

use crate::models::catalog::Category;
use crate::services::inference_service::{GenerateRequest, TextGenerator};
use crate::utils::llm_json::{decode_json, string_field};

const HINT_SYSTEM: &str = "You are a helpful tutor. You never reveal the answer directly. \
Respond with ONLY a JSON object of the form {\"hint\": \"...\"}.";

pub struct HintContext<'a> {
    pub question_text: &'a str,
    pub correct_answer: &'a str,
    pub code_snippet: Option<&'a str>,
    pub category: Category,
    /// 1 = general direction, 2 = specific concept, 3 = nearly the answer.
    pub level: u32,
    pub previous_hints: &'a [String],
}

fn level_guidance(level: u32) -> &'static str {
    match level {
        1 => "Give a GENERAL hint: point the student toward the right area of thinking without naming the concept.",
        2 => "Give a MORE SPECIFIC hint: name the concept, technique or data structure they should use.",
        _ => "Give a VERY SPECIFIC hint that nearly gives away the answer, without stating it outright.",
    }
}

pub fn fallback_hint(level: u32) -> &'static str {
    match level {
        1 => "Think about what data structure or approach would be most efficient here.",
        2 => "Consider breaking the problem into smaller sub-problems.",
        3 => "Review the key concepts related to this topic and look for edge cases.",
        _ => "Review the fundamentals of this topic.",
    }
}

pub fn build_prompt(ctx: &HintContext<'_>) -> String {
    let snippet = ctx
        .code_snippet
        .map(|code| format!("\nCode:\n```\n{}\n```\n", code))
        .unwrap_or_default();
    let previous = if ctx.previous_hints.is_empty() {
        String::new()
    } else {
        let listed = ctx
            .previous_hints
            .iter()
            .enumerate()
            .map(|(i, hint)| format!("{}. {}", i + 1, hint))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "\nHints already given (do not repeat them, go one step further):\n{}\n",
            listed
        )
    };

    format!(
        "A student is working on this {category} question and asked for hint #{level} of 3.\n\n\
         Question: {question}\n{snippet}\n\
         Reference answer (for your eyes only, never quote it): {answer}\n{previous}\n\
         {guidance}\n\
         Keep it to 1-2 sentences. Respond with ONLY: {{\"hint\": \"your hint here\"}}",
        category = ctx.category.display_name(),
        level = ctx.level,
        question = ctx.question_text,
        answer = ctx.correct_answer,
        guidance = level_guidance(ctx.level),
    )
}

/// Reads `{"hint": ...}`, falling back to the trimmed raw text.
fn read_hint(raw: &str) -> Option<String> {
    decode_json(raw)
        .ok()
        .and_then(|obj| string_field(&obj, "hint"))
        .or_else(|| {
            let text = raw.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
}

fn repeats(hint: &str, previous: &[String]) -> bool {
    let hint = hint.trim();
    previous.iter().any(|p| p.trim().eq_ignore_ascii_case(hint))
}

#[derive(Clone)]
pub struct HintService {
    generator: Arc<dyn TextGenerator>,
    model: Option<String>,
}

impl HintService {
    pub fn new(generator: Arc<dyn TextGenerator>, model: Option<String>) -> Self {
        Self { generator, model }
    }

    /// Never fails: model trouble degrades to a canned hint for the level.
    pub async fn generate_hint(&self, ctx: &HintContext<'_>) -> String {
        let request = GenerateRequest::new(build_prompt(ctx))
            .system(HINT_SYSTEM)
            .model(self.model.as_deref())
            .temperature(0.7);

        match self.generator.generate(request).await {
            Ok(raw) => match read_hint(&raw) {
                Some(hint) if repeats(&hint, ctx.previous_hints) => {
                    tracing::warn!(level = ctx.level, "model repeated an earlier hint, using fallback");
                    fallback_hint(ctx.level).to_string()
                }
                Some(hint) => hint,
                None => fallback_hint(ctx.level).to_string(),
            },
            Err(e) => {
                tracing::error!(error = %e, level = ctx.level, "hint generation failed, using fallback");
                fallback_hint(ctx.level).to_string()
            }
        }
    }
}
