use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use interview_prep_backend::{
    config::{Config, GradingMode},
    database::MemoryExamStore,
    error::{Error, Result},
    routes,
    services::inference_service::{GenerateRequest, TextGenerator},
    AppState,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

/// Stands in for Ollama: answers by the shape of the prompt.
#[derive(Default)]
struct ScriptedModel {
    questions: AtomicUsize,
    hint_prompts: Mutex<Vec<String>>,
    fail_everything: bool,
}

#[async_trait]
impl TextGenerator for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        if self.fail_everything {
            return Err(Error::InferenceUnavailable("connection refused".into()));
        }
        let prompt = request.prompt;
        if prompt.starts_with("Generate") {
            let n = self.questions.fetch_add(1, Ordering::SeqCst) + 1;
            if prompt.contains("MULTIPLE CHOICE") {
                return Ok(json!({
                    "question_text": format!("Which structure gives O(1) average lookup? ({})", n),
                    "options": {"A": "linked list", "B": "hash map", "C": "binary heap", "D": "stack"},
                    "correct_answer": "B",
                    "explanation": "Hash maps index by hashed keys."
                })
                .to_string());
            }
            return Ok(format!(
                "```json\n{}\n```",
                json!({
                    "question_text": format!("Explain list comprehensions ({})", n),
                    "correct_answer": "A concise way to build lists from iterables",
                    "explanation": "They combine map and filter."
                })
            ));
        }
        if prompt.starts_with("A student is working") {
            let mut seen = self.hint_prompts.lock().unwrap();
            seen.push(prompt);
            return Ok(json!({ "hint": format!("Hint {}", seen.len()) }).to_string());
        }
        if prompt.starts_with("Compare the student answer") {
            return Ok(r#"{"score": 8}"#.to_string());
        }
        if request.system.as_deref().map_or(false, |s| s.contains("teaching assistant")) {
            return Ok(json!({
                "mistakes": [],
                "strengths": ["clear"],
                "feedback": "Solid answer.",
                "recommendations": []
            })
            .to_string());
        }
        Ok(r#"{"encouragement": "Keep it up!"}"#.to_string())
    }

    async fn is_healthy(&self) -> bool {
        !self.fail_everything
    }
}

fn app_with(model: Arc<ScriptedModel>) -> Router {
    let config = Config {
        grading_mode: GradingMode::Crew,
        llm_rps: 1000,
        ..Config::default()
    };
    routes::router(AppState::new(Arc::new(MemoryExamStore::new()), model, config))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn practice_exam_runs_to_completion() {
    let app = app_with(Arc::default());

    let (status, started) = call(
        &app,
        "POST",
        "/exam/start",
        Some(json!({"topic": "python", "difficulty": "easy", "num_questions": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["total_questions"], 3);
    assert_eq!(started["current_index"], 1);
    assert_eq!(started["mode"], "practice");
    assert!(started["time_limit_seconds"].is_null());
    assert!(started["question"].get("correct_answer").is_none());
    assert!(started["question"].get("explanation").is_none());

    let exam_id = started["exam_id"].as_str().unwrap().to_string();
    for expected_index in [2, 3] {
        let (status, graded) = call(
            &app,
            "POST",
            "/exam/answer",
            Some(json!({"exam_id": exam_id, "answer": "builds lists from iterables"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(graded["exam_completed"], false);
        assert_eq!(graded["current_index"], expected_index);
        assert_eq!(graded["score"], 8.0);
        assert_eq!(graded["feedback"], "Solid answer.");
        assert_eq!(graded["encouragement"], "Keep it up!");
        assert!(graded["next_question"].get("correct_answer").is_none());
    }

    let (status, last) = call(
        &app,
        "POST",
        "/exam/answer",
        Some(json!({"exam_id": exam_id, "answer": "builds lists"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(last["exam_completed"], true);
    assert_eq!(last["current_index"], 3);
    assert_eq!(last["exam_summary"]["percentage"], 80.0);
    assert_eq!(last["exam_summary"]["grade_letter"], "B");
    assert_eq!(last["exam_summary"]["passed"], true);

    let (status, err) = call(
        &app,
        "POST",
        "/exam/answer",
        Some(json!({"exam_id": exam_id, "answer": "one more"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "invalid_state");

    let (status, detail) = call(&app, "GET", &format!("/exam/{}", exam_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["phase"], "completed");
    assert_eq!(detail["questions"].as_array().unwrap().len(), 3);

    let (status, listed) = call(&app, "GET", "/exams", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["grade_letter"], "B");
}

#[tokio::test]
async fn hints_are_limited_to_three_per_question() {
    let model = Arc::new(ScriptedModel::default());
    let app = app_with(model.clone());

    let (_, started) = call(
        &app,
        "POST",
        "/exam/start",
        Some(json!({"topic": "algorithms", "difficulty": "medium", "num_questions": 2})),
    )
    .await;
    let exam_id = started["exam_id"].as_str().unwrap().to_string();

    for level in 1..=3 {
        let (status, hint) = call(&app, "POST", "/exam/hint", Some(json!({"exam_id": exam_id}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hint["hint_level"], level);
        assert_eq!(hint["hints_used"], level);
    }
    let (status, err) = call(&app, "POST", "/exam/hint", Some(json!({"exam_id": exam_id}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "hints_exhausted");

    let prompts = model.hint_prompts.lock().unwrap().clone();
    assert!(prompts[2].contains("1. Hint 1"));
    assert!(prompts[2].contains("2. Hint 2"));

    let (_, graded) = call(
        &app,
        "POST",
        "/exam/answer",
        Some(json!({"exam_id": exam_id, "answer": "divide and conquer"})),
    )
    .await;
    assert_eq!(graded["hint_penalty"], 4.5);
    assert_eq!(graded["score"], 3.5);
}

#[tokio::test]
async fn timed_multiple_choice_exam() {
    let app = app_with(Arc::default());

    let (status, started) = call(
        &app,
        "POST",
        "/exam/start",
        Some(json!({
            "topic": "data_structures",
            "difficulty": "easy",
            "num_questions": 1,
            "mode": "timed",
            "question_type": "multiple_choice"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["time_limit_seconds"], 300);
    let options = started["question"]["options"].as_object().unwrap();
    assert_eq!(options.len(), 4);
    let correct_letter = options
        .iter()
        .find(|(_, text)| text.as_str() == Some("hash map"))
        .map(|(letter, _)| letter.clone())
        .unwrap();

    let exam_id = started["exam_id"].as_str().unwrap().to_string();
    let (status, err) = call(&app, "POST", "/exam/hint", Some(json!({"exam_id": exam_id}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "hints_disabled");

    let (status, graded) = call(
        &app,
        "POST",
        "/exam/answer",
        Some(json!({"exam_id": exam_id, "answer": correct_letter.to_lowercase()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graded["is_correct"], true);
    assert_eq!(graded["score"], 10.0);
    assert_eq!(graded["correct_answer"], correct_letter);
    assert_eq!(graded["exam_completed"], true);
}

#[tokio::test]
async fn invalid_requests_get_json_errors() {
    let app = app_with(Arc::default());

    let (status, err) = call(
        &app,
        "POST",
        "/exam/start",
        Some(json!({"topic": "python", "difficulty": "easy", "num_questions": 50})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let (status, err) = call(
        &app,
        "POST",
        "/exam/start",
        Some(json!({"topic": "basket_weaving", "difficulty": "easy"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "bad_request");

    let (status, err) = call(&app, "GET", "/exam/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (status, _) = call(
        &app,
        "POST",
        "/exam/answer",
        Some(json!({"exam_id": "00000000-0000-0000-0000-000000000000", "answer": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreachable_model_is_a_503() {
    let model = Arc::new(ScriptedModel {
        fail_everything: true,
        ..ScriptedModel::default()
    });
    let app = app_with(model);

    let (status, err) = call(
        &app,
        "POST",
        "/exam/start",
        Some(json!({"topic": "sql", "difficulty": "hard"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err["error"], "inference_unavailable");

    let (status, health) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health, json!({"backend": "ok", "database": "ok", "ollama": "error"}));
}

#[tokio::test]
async fn topics_catalog_lists_every_option() {
    let app = app_with(Arc::default());
    let (status, catalog) = call(&app, "GET", "/topics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(catalog["topics"].as_array().unwrap().len(), 8);
    assert_eq!(catalog["difficulties"], json!(["easy", "medium", "hard"]));
    assert_eq!(catalog["question_types"], json!(["written", "multiple_choice"]));
    assert_eq!(catalog["categories"].as_array().unwrap().len(), 6);

    let timed = catalog["modes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == "timed")
        .unwrap();
    assert_eq!(timed["has_hints"], false);
    assert_eq!(timed["time_limit_seconds"], 300);
}
