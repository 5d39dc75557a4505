//! Closed vocabularies shared by requests, prompts and persisted rows.
//!
//! Rows store these as plain text; services parse them back with `FromStr`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Python,
    Oop,
    DataStructures,
    Algorithms,
    Sql,
    Javascript,
    Java,
    WebDevelopment,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Python,
        Topic::Oop,
        Topic::DataStructures,
        Topic::Algorithms,
        Topic::Sql,
        Topic::Javascript,
        Topic::Java,
        Topic::WebDevelopment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Python => "python",
            Topic::Oop => "oop",
            Topic::DataStructures => "data_structures",
            Topic::Algorithms => "algorithms",
            Topic::Sql => "sql",
            Topic::Javascript => "javascript",
            Topic::Java => "java",
            Topic::WebDevelopment => "web_development",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Topic::Python => "Python",
            Topic::Oop => "Object-Oriented Programming",
            Topic::DataStructures => "Data Structures",
            Topic::Algorithms => "Algorithms",
            Topic::Sql => "SQL & Databases",
            Topic::Javascript => "JavaScript",
            Topic::Java => "Java",
            Topic::WebDevelopment => "Web Development",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Topic::Python => "🐍",
            Topic::Oop => "🏗️",
            Topic::DataStructures => "📊",
            Topic::Algorithms => "⚙️",
            Topic::Sql => "🗄️",
            Topic::Javascript => "🌐",
            Topic::Java => "☕",
            Topic::WebDevelopment => "🖥️",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Coding,
    #[default]
    Concept,
    Debug,
    SystemDesign,
    Behavioral,
    CodeReview,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Coding,
        Category::Concept,
        Category::Debug,
        Category::SystemDesign,
        Category::Behavioral,
        Category::CodeReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Coding => "coding",
            Category::Concept => "concept",
            Category::Debug => "debug",
            Category::SystemDesign => "system_design",
            Category::Behavioral => "behavioral",
            Category::CodeReview => "code_review",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Coding => "Coding",
            Category::Concept => "Concept",
            Category::Debug => "Debug",
            Category::SystemDesign => "System Design",
            Category::Behavioral => "Behavioral",
            Category::CodeReview => "Code Review",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Coding => "💻",
            Category::Concept => "📖",
            Category::Debug => "🐛",
            Category::SystemDesign => "🏛️",
            Category::Behavioral => "🤝",
            Category::CodeReview => "🔍",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::Coding => "Write functions and algorithms",
            Category::Concept => "Explain technical concepts",
            Category::Debug => "Find and fix bugs in code",
            Category::SystemDesign => "Design systems and architectures",
            Category::Behavioral => "Situational and teamwork questions",
            Category::CodeReview => "Review and improve given code",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Practice,
    Timed,
    Mock,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Practice, Mode::Timed, Mode::Mock];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Practice => "practice",
            Mode::Timed => "timed",
            Mode::Mock => "mock",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Practice => "Practice",
            Mode::Timed => "Timed Exam",
            Mode::Mock => "Mock Interview",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Mode::Practice => "📝",
            Mode::Timed => "⏱️",
            Mode::Mock => "🎤",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mode::Practice => "Unlimited time, hints available",
            Mode::Timed => "Countdown timer, no hints",
            Mode::Mock => "Real interview simulation with timer",
        }
    }

    /// Default per-question time limit in seconds.
    pub fn default_time_limit(&self) -> Option<i32> {
        match self {
            Mode::Practice => None,
            Mode::Timed => Some(300),
            Mode::Mock => Some(420),
        }
    }

    pub fn hints_enabled(&self) -> bool {
        !matches!(self, Mode::Timed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Written,
    MultipleChoice,
}

impl QuestionType {
    pub const ALL: [QuestionType; 2] = [QuestionType::Written, QuestionType::MultipleChoice];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Written => "written",
            QuestionType::MultipleChoice => "multiple_choice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    InProgress,
    Completed,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::InProgress => "in_progress",
            ExamStatus::Completed => "completed",
        }
    }
}

macro_rules! impl_text_enum {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = crate::error::Error;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| {
                        crate::error::Error::Internal(format!(
                            "unknown {} value '{}'",
                            stringify!($ty),
                            s
                        ))
                    })
                }
            }
        )+
    };
}

impl_text_enum!(Topic, Difficulty, Category, Mode, QuestionType, ExamStatus);
