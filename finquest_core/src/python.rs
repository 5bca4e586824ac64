//! Python bindings

use pyo3::exceptions::{PyPermissionError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::Path;

use crate::config::QuizConfig;
use crate::db::SqliteStore;
use crate::engine::{LevelStats, ModuleState};
use crate::error::EngineError;
use crate::import::{import_catalog_file, ImportKind};
use crate::progress::ProgressRecord;
use crate::service::LearningService;

impl From<EngineError> for PyErr {
    fn from(e: EngineError) -> PyErr {
        match e {
            EngineError::NotAuthenticated => PyPermissionError::new_err(e.to_string()),
            EngineError::ModuleNotFound(_) | EngineError::InvalidScore(_) => {
                PyValueError::new_err(e.to_string())
            }
            _ => PyRuntimeError::new_err(e.to_string()),
        }
    }
}

#[pyclass(name = "LevelStats")]
#[derive(Debug, Clone)]
pub struct PyLevelStats {
    #[pyo3(get)]
    pub current_level: String,
    #[pyo3(get)]
    pub total_xp: u64,
    #[pyo3(get)]
    pub level_progress: f64,
    #[pyo3(get)]
    pub next_level: Option<String>,
    #[pyo3(get)]
    pub next_level_xp: u64,
}

#[pymethods]
impl PyLevelStats {
    fn __repr__(&self) -> String {
        format!(
            "LevelStats(level='{}', xp={}, progress={:.1}%)",
            self.current_level, self.total_xp, self.level_progress
        )
    }
}

impl From<LevelStats> for PyLevelStats {
    fn from(s: LevelStats) -> Self {
        PyLevelStats {
            current_level: s.current_level.to_string(),
            total_xp: s.total_xp,
            level_progress: s.level_progress,
            next_level: s.next_level.map(|l| l.to_string()),
            next_level_xp: s.next_level_xp,
        }
    }
}

#[pyclass(name = "ProgressRecord")]
#[derive(Debug, Clone)]
pub struct PyProgressRecord {
    #[pyo3(get)]
    pub module_id: String,
    #[pyo3(get)]
    pub score: u8,
    #[pyo3(get)]
    pub xp_earned: u32,
    #[pyo3(get)]
    pub completed: bool,
    #[pyo3(get)]
    pub attempts: u32,
    #[pyo3(get)]
    pub updated_at: String,
}

#[pymethods]
impl PyProgressRecord {
    fn __repr__(&self) -> String {
        format!(
            "ProgressRecord(module='{}', score={}, attempts={}, completed={})",
            self.module_id, self.score, self.attempts, self.completed
        )
    }
}

impl From<ProgressRecord> for PyProgressRecord {
    fn from(r: ProgressRecord) -> Self {
        PyProgressRecord {
            module_id: r.module_id,
            score: r.score,
            xp_earned: r.xp_earned,
            completed: r.completed,
            attempts: r.attempts,
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

fn service(db_path: &str, user_id: Option<String>) -> PyResult<LearningService<SqliteStore>> {
    let store = SqliteStore::open(db_path)?;
    Ok(LearningService::new(store, user_id, QuizConfig::default()))
}

#[pyfunction]
#[pyo3(name = "init_database")]
fn py_init_database(db_path: &str) -> PyResult<()> {
    SqliteStore::open(db_path)?;
    Ok(())
}

#[pyfunction]
#[pyo3(name = "import_catalog")]
fn py_import_catalog(db_path: &str, file_path: &str, kind: &str) -> PyResult<usize> {
    let kind = match kind {
        "topics" => ImportKind::Topics,
        "modules" => ImportKind::Modules,
        other => return Err(PyValueError::new_err(format!("Unknown import kind: {}", other))),
    };
    let mut store = SqliteStore::open(db_path)?;
    Ok(import_catalog_file(&mut store, Path::new(file_path), kind)?)
}

#[pyfunction]
#[pyo3(name = "get_stats")]
fn py_get_stats(db_path: &str, user_id: Option<String>) -> PyResult<PyLevelStats> {
    Ok(service(db_path, user_id)?.stats()?.into())
}

#[pyfunction]
#[pyo3(name = "save_attempt")]
fn py_save_attempt(db_path: &str, user_id: Option<String>, module_id: &str, score: u8) -> PyResult<PyProgressRecord> {
    Ok(service(db_path, user_id)?.save_score(module_id, score)?.into())
}

#[pyfunction]
#[pyo3(name = "is_module_unlocked")]
fn py_is_module_unlocked(db_path: &str, user_id: Option<String>, module_id: &str) -> PyResult<bool> {
    Ok(service(db_path, user_id)?.is_module_unlocked(module_id)?)
}

#[pyfunction]
#[pyo3(name = "module_states")]
fn py_module_states(db_path: &str, user_id: Option<String>) -> PyResult<Vec<(String, String)>> {
    let states = service(db_path, user_id)?.module_states()?;
    Ok(states
        .into_iter()
        .map(|(id, state)| {
            let label = match state {
                ModuleState::Locked => "locked",
                ModuleState::Unlocked => "unlocked",
                ModuleState::Completed => "completed",
            };
            (id, label.to_string())
        })
        .collect())
}

/// FinQuest Core Python Module
#[pymodule]
fn finquest_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    crate::logging::init("warn");

    m.add_function(wrap_pyfunction!(py_init_database, m)?)?;
    m.add_function(wrap_pyfunction!(py_import_catalog, m)?)?;
    m.add_function(wrap_pyfunction!(py_get_stats, m)?)?;
    m.add_function(wrap_pyfunction!(py_save_attempt, m)?)?;
    m.add_function(wrap_pyfunction!(py_is_module_unlocked, m)?)?;
    m.add_function(wrap_pyfunction!(py_module_states, m)?)?;

    m.add_class::<PyLevelStats>()?;
    m.add_class::<PyProgressRecord>()?;

    Ok(())
}
