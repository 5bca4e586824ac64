//! FinQuest Core - learning progression engine for the finance education app
//!
//! Derives level, XP and module unlock state from the lesson catalog and a
//! user's progress, scores quiz attempts and persists them to SQLite.
//! Python bindings are available behind the `python` feature.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod import;
pub mod logging;
pub mod progress;
pub mod quiz;
pub mod service;

#[cfg(feature = "python")]
mod python;

pub use cache::{CacheKey, QueryCache};
pub use catalog::{Catalog, Level, Module, ModuleId, Question, Topic, TopicId};
pub use config::{EngineConfig, QuizConfig, SavePolicy};
pub use db::{load_catalog, LearningStore, SqliteStore};
pub use engine::{
    compute_stats, is_module_unlocked, module_states, topic_overview, LevelStats, ModuleState,
    TopicProgress,
};
pub use error::{EngineError, ParseLevelError, Result};
pub use fuzzy::{check_match, MatchResult};
pub use import::{import_catalog_file, ImportKind};
pub use progress::{ProgressRecord, QuizOutcome, PASS_THRESHOLD};
pub use quiz::{score_attempt, Answer, AnswerFeedback, PresentedQuestion, QuizSession};
pub use service::LearningService;
