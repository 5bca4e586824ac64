//! Error taxonomy for the progression engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Not authenticated: no user id resolved for this session")]
    NotAuthenticated,

    #[error("Module not found in catalog: {0}")]
    ModuleNotFound(String),

    #[error("Module is locked for this user: {0}")]
    ModuleLocked(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Invalid catalog entry '{id}': {reason}")]
    InvalidCatalog { id: String, reason: String },

    #[error("Score out of range (0-100): {0}")]
    InvalidScore(u8),

    #[error("Import error: {0}")]
    Import(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] calamine::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A level name outside beginner, intermediate, advanced and expert
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown level '{0}'")]
pub struct ParseLevelError(pub String);

impl EngineError {
    /// True for failures of the underlying store, which the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
