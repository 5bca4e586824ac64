//! Catalog types - topics, modules and their questions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{EngineError, ParseLevelError};

pub type TopicId = String;
pub type ModuleId = String;

/// Difficulty level, strictly ordered from beginner to expert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Beginner,
        Level::Intermediate,
        Level::Advanced,
        Level::Expert,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
            Level::Expert => "expert",
        }
    }

    /// The level after this one, `None` for expert
    pub fn next(self) -> Option<Level> {
        Level::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Level::Beginner),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            "expert" => Ok(Level::Expert),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// Named knowledge category grouping modules across levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub sort_order: i64,
}

/// A single quiz question.
///
/// With `options` it is multiple choice and `answer` must equal one option;
/// without options it is free text, checked by fuzzy matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    pub fn is_multiple_choice(&self) -> bool {
        !self.options.is_empty()
    }
}

/// A quiz unit in one topic and one level, worth a fixed amount of XP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub topic_id: TopicId,
    pub level: Level,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sort_order: i64,
    pub xp_value: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// Decode a stored questions column.
///
/// Anything that is not a well-formed question array becomes an empty list;
/// one broken module must not fail the whole catalog load.
pub fn parse_questions(module_id: &str, raw: Option<&str>) -> Vec<Question> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<Question>>(raw) {
        Ok(questions) => questions,
        Err(e) => {
            warn!(module_id, error = %e, "Malformed questions column, using empty set");
            Vec::new()
        }
    }
}

/// Parse a level column value, failing fast on unknown values
pub fn parse_level(module_id: &str, raw: &str) -> Result<Level, EngineError> {
    raw.parse().map_err(|e: ParseLevelError| EngineError::InvalidCatalog {
        id: module_id.to_string(),
        reason: e.to_string(),
    })
}

/// Read-only view of all topics and modules, sorted by `sort_order`
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    topics: Vec<Topic>,
    modules: Vec<Module>,
    by_id: HashMap<ModuleId, usize>,
}

impl Catalog {
    pub fn new(mut topics: Vec<Topic>, mut modules: Vec<Module>) -> Self {
        topics.sort_by_key(|t| t.sort_order);
        modules.sort_by_key(|m| m.sort_order);
        let by_id = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();

        Catalog { topics, modules, by_id }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, module_id: &str) -> Option<&Module> {
        self.by_id.get(module_id).map(|&i| &self.modules[i])
    }

    /// Modules of one level, in catalog order
    pub fn modules_at(&self, level: Level) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(move |m| m.level == level)
    }

    /// The unlock lane for a (topic, level) pair, ordered by `sort_order`
    pub fn lane(&self, topic_id: &str, level: Level) -> Vec<&Module> {
        let mut lane: Vec<&Module> = self
            .modules
            .iter()
            .filter(|m| m.topic_id == topic_id && m.level == level)
            .collect();
        lane.sort_by_key(|m| m.sort_order);
        lane
    }
}
