use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingMode {
    Single,
    Crew,
}

impl FromStr for GradingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(GradingMode::Single),
            "crew" => Ok(GradingMode::Crew),
            other => Err(format!("expected 'single' or 'crew', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{}'", other)),
        }
    }
}

/// Per-agent model overrides. `None` falls back to `Config::ollama_model`.
#[derive(Debug, Clone, Default)]
pub struct ModelOverrides {
    pub generator: Option<String>,
    pub grader: Option<String>,
    pub feedback: Option<String>,
    pub review: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: Option<String>,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub ollama_timeout_secs: u64,
    pub max_retries: u32,
    pub grading_mode: GradingMode,
    pub models: ModelOverrides,
    pub default_exam_questions: u32,
    pub llm_rps: u32,
    pub cors_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:8000"),
            database_url: get_env_opt("DATABASE_URL"),
            ollama_base_url: get_env_or("OLLAMA_BASE_URL", "http://ollama:11434")
                .trim_end_matches('/')
                .to_string(),
            ollama_model: get_env_or("OLLAMA_MODEL", "qwen2.5:0.5b"),
            ollama_timeout_secs: get_env_parse_or("OLLAMA_TIMEOUT_SECS", 120)?,
            max_retries: get_env_parse_or("MAX_RETRIES", 3)?,
            grading_mode: get_env_parse_or("GRADING_MODE", GradingMode::Crew)?,
            models: ModelOverrides {
                generator: get_env_opt("GENERATOR_MODEL"),
                grader: get_env_opt("GRADER_MODEL"),
                feedback: get_env_opt("FEEDBACK_MODEL"),
                review: get_env_opt("REVIEW_MODEL"),
            },
            default_exam_questions: get_env_parse_or("DEFAULT_EXAM_QUESTIONS", 5)?,
            llm_rps: get_env_parse_or("LLM_RPS", 20)?,
            cors_origins: get_env_opt("CORS_ORIGINS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            log_format: get_env_parse_or("LOG_FORMAT", LogFormat::Text)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::Config("MAX_RETRIES must be at least 1".to_string()));
        }
        if !(1..=20).contains(&self.default_exam_questions) {
            return Err(Error::Config(
                "DEFAULT_EXAM_QUESTIONS must be between 1 and 20".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:8000".to_string(),
            database_url: None,
            ollama_base_url: "http://ollama:11434".to_string(),
            ollama_model: "qwen2.5:0.5b".to_string(),
            ollama_timeout_secs: 120,
            max_retries: 3,
            grading_mode: GradingMode::Crew,
            models: ModelOverrides::default(),
            default_exam_questions: 5,
            llm_rps: 20,
            cors_origins: Vec::new(),
            log_format: LogFormat::Text,
        }
    }
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn get_env_or(name: &str, default: &str) -> String {
    get_env_opt(name).unwrap_or_else(|| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
