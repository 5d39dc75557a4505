use serde::{Deserialize, Serialize};

use crate::models::catalog::{Category, Difficulty, Mode, QuestionType, Topic};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicInfo {
    pub id: String,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeInfo {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub has_timer: bool,
    pub has_hints: bool,
    pub time_limit_seconds: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsResponse {
    pub topics: Vec<TopicInfo>,
    pub difficulties: Vec<String>,
    pub question_types: Vec<String>,
    pub categories: Vec<CategoryInfo>,
    pub modes: Vec<ModeInfo>,
}

impl TopicsResponse {
    pub fn catalog() -> Self {
        Self {
            topics: Topic::ALL
                .iter()
                .map(|t| TopicInfo {
                    id: t.to_string(),
                    name: t.display_name().to_string(),
                    icon: t.icon().to_string(),
                })
                .collect(),
            difficulties: Difficulty::ALL.iter().map(|d| d.to_string()).collect(),
            question_types: QuestionType::ALL.iter().map(|q| q.to_string()).collect(),
            categories: Category::ALL
                .iter()
                .map(|c| CategoryInfo {
                    id: c.to_string(),
                    name: c.display_name().to_string(),
                    icon: c.icon().to_string(),
                    description: c.description().to_string(),
                })
                .collect(),
            modes: Mode::ALL
                .iter()
                .map(|m| ModeInfo {
                    id: m.to_string(),
                    name: m.display_name().to_string(),
                    icon: m.icon().to_string(),
                    description: m.description().to_string(),
                    has_timer: m.default_time_limit().is_some(),
                    has_hints: m.hints_enabled(),
                    time_limit_seconds: m.default_time_limit(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub backend: String,
    pub database: String,
    pub ollama: String,
}
