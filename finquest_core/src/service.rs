//! Session-scoped orchestration: loads catalog and progress, derives stats,
//! persists quiz outcomes and keeps the cache honest.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::QueryCache;
use crate::catalog::{Catalog, Module};
use crate::config::QuizConfig;
use crate::db::{load_catalog, LearningStore};
use crate::engine::{self, LevelStats, ModuleState, TopicProgress};
use crate::error::{EngineError, Result};
use crate::progress::{ProgressRecord, QuizOutcome};

pub struct LearningService<S: LearningStore> {
    store: S,
    user_id: Option<String>,
    config: QuizConfig,
    cache: QueryCache,
}

impl<S: LearningStore> LearningService<S> {
    /// `user_id` comes from the external auth provider; `None` means signed out
    pub fn new(store: S, user_id: Option<String>, config: QuizConfig) -> Self {
        LearningService {
            store,
            user_id: user_id.filter(|id| !id.trim().is_empty()),
            config,
            cache: QueryCache::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    pub fn user_id(&self) -> Result<&str> {
        self.user_id.as_deref().ok_or(EngineError::NotAuthenticated)
    }

    /// Catalog, read once and kept until [`LearningService::refresh_catalog`]
    pub fn catalog(&mut self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.cache.catalog() {
            return Ok(catalog);
        }
        let catalog = Arc::new(load_catalog(&self.store)?);
        self.cache.put_catalog(Arc::clone(&catalog));
        Ok(catalog)
    }

    pub fn refresh_catalog(&mut self) -> Result<Arc<Catalog>> {
        self.cache.clear();
        self.catalog()
    }

    pub fn module(&mut self, module_id: &str) -> Result<Module> {
        self.catalog()?
            .module(module_id)
            .cloned()
            .ok_or_else(|| EngineError::ModuleNotFound(module_id.to_string()))
    }

    pub fn progress(&mut self) -> Result<Arc<Vec<ProgressRecord>>> {
        let user_id = self.user_id()?.to_string();
        if let Some(progress) = self.cache.progress(&user_id) {
            return Ok(progress);
        }
        let progress = Arc::new(self.store.list_progress(&user_id)?);
        self.cache.put_progress(&user_id, Arc::clone(&progress));
        Ok(progress)
    }

    pub fn stats(&mut self) -> Result<LevelStats> {
        let user_id = self.user_id()?.to_string();
        if let Some(stats) = self.cache.stats(&user_id) {
            return Ok(stats);
        }
        let catalog = self.catalog()?;
        let progress = self.progress()?;
        let stats = engine::compute_stats(&catalog, &progress);
        self.cache.put_stats(&user_id, stats.clone());
        Ok(stats)
    }

    pub fn is_module_unlocked(&mut self, module_id: &str) -> Result<bool> {
        let catalog = self.catalog()?;
        if catalog.module(module_id).is_none() {
            return Err(EngineError::ModuleNotFound(module_id.to_string()));
        }
        let level = self.stats()?.current_level;
        let progress = self.progress()?;
        Ok(engine::is_module_unlocked(module_id, &catalog, &progress, level))
    }

    pub fn module_states(&mut self) -> Result<Vec<(String, ModuleState)>> {
        let catalog = self.catalog()?;
        let level = self.stats()?.current_level;
        let progress = self.progress()?;
        Ok(engine::module_states(&catalog, &progress, level))
    }

    pub fn topic_overview(&mut self) -> Result<Vec<TopicProgress>> {
        let catalog = self.catalog()?;
        let progress = self.progress()?;
        Ok(engine::topic_overview(&catalog, &progress))
    }

    /// Module to quiz on, refused while it is still locked
    pub fn start_module(&mut self, module_id: &str) -> Result<Module> {
        let module = self.module(module_id)?;
        if !self.is_module_unlocked(module_id)? {
            return Err(EngineError::ModuleLocked(module_id.to_string()));
        }
        Ok(module)
    }

    /// Re-grade a caller supplied outcome from its score alone, so completion
    /// and XP always follow the pass threshold and the module's XP value.
    fn regrade(&self, module: &Module, outcome: &QuizOutcome) -> Result<QuizOutcome> {
        let graded = QuizOutcome::for_score(module, outcome.score, self.config.pass_threshold)?;
        if graded != *outcome {
            warn!(
                module_id = %module.id,
                score = outcome.score,
                claimed_completed = outcome.completed,
                claimed_xp = outcome.xp_earned,
                "Outcome disagrees with its score, re-graded"
            );
        }
        Ok(graded)
    }

    /// Persist one attempt for the signed-in user.
    ///
    /// Only the score is trusted; completion and XP are derived from it.
    /// On success cached progress and stats are dropped so the next read
    /// sees the new row. On failure nothing cached changes and the caller
    /// may retry.
    pub fn save_attempt(&mut self, module_id: &str, outcome: &QuizOutcome) -> Result<ProgressRecord> {
        let user_id = self.user_id()?.to_string();
        let module = self.module(module_id)?;
        let outcome = self.regrade(&module, outcome)?;

        match self.store.upsert_progress(&user_id, &module, &outcome, Utc::now()) {
            Ok(record) => {
                self.cache.invalidate_user(&user_id);
                info!(
                    user_id = %user_id,
                    module_id,
                    score = record.score,
                    attempts = record.attempts,
                    "Attempt saved"
                );
                Ok(record)
            }
            Err(e) => {
                warn!(user_id = %user_id, module_id, error = %e, "Failed to save attempt");
                Err(e)
            }
        }
    }

    /// Save a raw score, grading it against the module first
    pub fn save_score(&mut self, module_id: &str, score: u8) -> Result<ProgressRecord> {
        let module = self.module(module_id)?;
        let outcome = QuizOutcome::for_score(&module, score, self.config.pass_threshold)?;
        self.save_attempt(module_id, &outcome)
    }

    /// Quiz completion hook: saves when the configured policy allows it.
    /// `Ok(None)` means the outcome was intentionally not persisted.
    pub fn on_quiz_complete(&mut self, module_id: &str, outcome: &QuizOutcome) -> Result<Option<ProgressRecord>> {
        let module = self.module(module_id)?;
        let outcome = self.regrade(&module, outcome)?;
        if !self.config.save_policy.should_save(&outcome) {
            info!(module_id, score = outcome.score, policy = ?self.config.save_policy, "Attempt not saved under policy");
            return Ok(None);
        }
        self.save_attempt(module_id, &outcome).map(Some)
    }
}
