use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Source label for questions pulled from the Stack Exchange network.
pub const SOURCE_STACKEXCHANGE: &str = "stackexchange";
/// Source label for questions written by the LLM.
pub const SOURCE_GENERATED: &str = "generated";

/// Interview round a question belongs to.
///
/// Ordering follows the default package layout and is used to break ties
/// when several categories are equally short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum QuestionType {
    Behavioral,
    Technical,
    Coding,
    #[serde(rename = "System Design")]
    SystemDesign,
}

impl QuestionType {
    pub const ALL: [QuestionType; 4] = [
        QuestionType::Behavioral,
        QuestionType::Technical,
        QuestionType::Coding,
        QuestionType::SystemDesign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Behavioral => "Behavioral",
            QuestionType::Technical => "Technical",
            QuestionType::Coding => "Coding",
            QuestionType::SystemDesign => "System Design",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "behavioral" | "behavioural" => Ok(QuestionType::Behavioral),
            "technical" => Ok(QuestionType::Technical),
            "coding" => Ok(QuestionType::Coding),
            "systemdesign" => Ok(QuestionType::SystemDesign),
            _ => Err(format!("unknown question type '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("unknown difficulty '{s}'")),
        }
    }
}

// Model output is not always cased the way we serialize, so both enums
// deserialize through their lenient `FromStr`.
impl<'de> Deserialize<'de> for QuestionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// What an interviewer should listen for when asking a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationRubric {
    pub signals: Vec<String>,
    pub red_flags: Vec<String>,
    pub scoring: String,
}

/// Classifier output cached per question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMeta {
    pub qtype: QuestionType,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub evaluation_rubric: EvaluationRubric,
}

// Ingest value structs (crawl + generation → upsert)

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerItem {
    pub external_id: String,
    pub body_markdown: Option<String>,
    pub body_html: Option<String>,
    pub score: i64,
    pub is_accepted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// A provider-agnostic question ready to be upserted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionItem {
    pub source: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub body_markdown: Option<String>,
    pub body_html: Option<String>,
    pub tags: Vec<String>,
    pub companies: Vec<String>,
    pub question_type: Option<String>,
    pub difficulty: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub score: i64,
    pub answers: Vec<AnswerItem>,
    /// Content hash; computed from title + body when absent.
    pub hash: Option<String>,
}

// Rows

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub source: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub body_markdown: Option<String>,
    pub body_html: Option<String>,
    pub tags: Vec<String>,
    pub companies: Vec<String>,
    pub question_type: Option<String>,
    pub difficulty: Option<String>,
    pub created_at_source: Option<DateTime<Utc>>,
    pub score: i64,
    pub hash: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerRow {
    pub id: i64,
    pub question_id: i64,
    pub external_id: String,
    pub body_markdown: Option<String>,
    pub body_html: Option<String>,
    pub score: i64,
    pub is_accepted: bool,
    pub created_at_source: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct QuestionMetaRow {
    pub question_id: i64,
    pub qtype: Option<String>,
    pub difficulty: Option<String>,
    pub rubric: Option<Value>,
}

impl QuestionMetaRow {
    /// Converts the stored strings back into typed metadata.
    /// Returns `None` when the row holds labels this build does not recognise.
    pub fn into_meta(self) -> Option<QuestionMeta> {
        let qtype = self.qtype.as_deref()?.parse().ok()?;
        let difficulty = self.difficulty.as_deref()?.parse().ok()?;
        let evaluation_rubric = self
            .rubric
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Some(QuestionMeta {
            qtype,
            difficulty,
            evaluation_rubric,
        })
    }
}

/// The slice of a question the package builder works with.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CandidateQuestion {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub url: String,
    pub tags: Vec<String>,
}

impl CandidateQuestion {
    /// Title and body as shown to interviewers and sent to the embedder.
    pub fn display_text(&self) -> String {
        format!("{}\n\n{}", self.title.trim(), self.body.trim())
    }
}
