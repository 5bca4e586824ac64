//! Engine configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::fuzzy::DEFAULT_MATCH_THRESHOLD;
use crate::progress::{QuizOutcome, PASS_THRESHOLD};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub quiz: QuizConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database_path: "finquest.db".to_string(),
        }
    }
}

/// Which finished attempts get written to the progress store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    /// Every finished attempt, passing or not
    #[default]
    EveryAttempt,
    /// Only attempts at or above the pass threshold
    PassingOnly,
    /// Only perfect scores
    PerfectOnly,
}

impl SavePolicy {
    pub fn should_save(self, outcome: &QuizOutcome) -> bool {
        match self {
            SavePolicy::EveryAttempt => true,
            SavePolicy::PassingOnly => outcome.completed,
            SavePolicy::PerfectOnly => outcome.score == 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Minimum score (inclusive) that completes a module
    pub pass_threshold: u8,
    /// Similarity needed for a free-text answer, 0.0-1.0
    pub answer_match_threshold: f64,
    pub shuffle_options: bool,
    pub save_policy: SavePolicy,
}

impl Default for QuizConfig {
    fn default() -> Self {
        QuizConfig {
            pass_threshold: PASS_THRESHOLD,
            answer_match_threshold: DEFAULT_MATCH_THRESHOLD,
            shuffle_options: true,
            save_policy: SavePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Read config from `path`, falling back to defaults when the file is absent
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
