//! Progress tracking - per-user module completion records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Level, Module, ModuleId, TopicId};
use crate::error::EngineError;

/// Default passing score, inclusive
pub const PASS_THRESHOLD: u8 = 70;

/// One user's stored result for one module, unique per (user, module)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub module_id: ModuleId,
    pub topic_id: TopicId,
    pub level: Level,
    pub score: u8,
    pub xp_earned: u32,
    pub completed: bool,
    pub attempts: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Result of one finished quiz attempt, ready to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub score: u8,
    pub xp_earned: u32,
    pub completed: bool,
}

impl QuizOutcome {
    /// Outcome for `score` on `module`: XP is only awarded on a pass
    pub fn grade(module: &Module, score: u8, pass_threshold: u8) -> Self {
        let completed = score >= pass_threshold;
        QuizOutcome {
            score,
            xp_earned: if completed { module.xp_value } else { 0 },
            completed,
        }
    }

    /// Like [`QuizOutcome::grade`] for an externally supplied score
    pub fn for_score(module: &Module, score: u8, pass_threshold: u8) -> Result<Self, EngineError> {
        if score > 100 {
            return Err(EngineError::InvalidScore(score));
        }
        Ok(Self::grade(module, score, pass_threshold))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.score > 100 {
            return Err(EngineError::InvalidScore(self.score));
        }
        Ok(())
    }
}

/// Sum of stored XP across records, completed or not
pub fn total_xp(progress: &[ProgressRecord]) -> u64 {
    progress.iter().map(|p| u64::from(p.xp_earned)).sum()
}

/// Whether the record for `module_id` is marked completed
pub fn is_completed(progress: &[ProgressRecord], module_id: &str) -> bool {
    progress
        .iter()
        .any(|p| p.module_id == module_id && p.completed)
}
