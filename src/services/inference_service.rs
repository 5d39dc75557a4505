use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::utils::llm_json::{decode_json, Decoded};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn model(mut self, model: Option<&str>) -> Self {
        self.model = model.map(str::to_string);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text-generation backend. Implementations own transport-level retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String>;

    async fn is_healthy(&self) -> bool;
}

/// Runs one generation and decodes a JSON object from the reply.
pub async fn generate_json(
    generator: &dyn TextGenerator,
    request: GenerateRequest,
) -> Result<Map<String, JsonValue>> {
    let raw = generator.generate(request).await?;
    match decode_json(&raw) {
        Decoded::Parsed(obj) => Ok(obj),
        Decoded::Unparsable(reason) => Err(Error::MalformedResponse(reason)),
    }
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaGenerate<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Deserialize)]
struct OllamaReply {
    #[serde(default)]
    response: String,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    default_model: String,
    timeout: Duration,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(
        client: Client,
        base_url: String,
        default_model: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            base_url,
            default_model,
            timeout,
            max_retries: max_retries.max(1),
        }
    }

    async fn generate_once(&self, request: &GenerateRequest) -> std::result::Result<String, String> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let payload = OllamaGenerate {
            model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: request.temperature.map(|temperature| OllamaOptions { temperature }),
        };

        let res = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("request timed out after {}s", self.timeout.as_secs())
                } else {
                    format!("request failed: {}", e)
                }
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, truncate(&text, 200)));
        }

        let reply: OllamaReply = res
            .json()
            .await
            .map_err(|e| format!("unreadable reply body: {}", e))?;
        Ok(reply.response)
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            match self.generate_once(&request).await {
                Ok(text) => {
                    tracing::debug!(attempt, chars = text.len(), "ollama generation succeeded");
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(attempt, max = self.max_retries, error = %e, "ollama generation failed");
                    last_error = e;
                }
            }
        }
        Err(Error::InferenceUnavailable(format!(
            "{} attempts failed, last error: {}",
            self.max_retries, last_error
        )))
    }

    async fn is_healthy(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "ollama health probe failed");
                false
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
