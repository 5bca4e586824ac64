//! Progression engine - level, XP and unlock state derived from catalog + progress
//!
//! Everything here is a pure function of `(Catalog, &[ProgressRecord])`; there
//! is no hidden state, so recomputing after a save always reflects the store.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::{Catalog, Level, ModuleId, TopicId};
use crate::progress::{self, ProgressRecord};

/// Derived level summary for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    pub current_level: Level,
    pub total_xp: u64,
    /// Percentage of `next_level_xp` reached, 0-100
    pub level_progress: f64,
    pub next_level: Option<Level>,
    pub next_level_xp: u64,
}

impl Default for LevelStats {
    fn default() -> Self {
        LevelStats {
            current_level: Level::Beginner,
            total_xp: 0,
            level_progress: 0.0,
            next_level: Some(Level::Intermediate),
            next_level_xp: 0,
        }
    }
}

/// Per-level totals of one catalog, indexed by `Level::index`.
/// Summed in `u64` so any mix of `u32` module values fits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelThresholds {
    totals: [u64; 4],
    module_counts: [usize; 4],
}

impl LevelThresholds {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut thresholds = LevelThresholds::default();
        for module in catalog.modules() {
            let i = module.level.index();
            thresholds.totals[i] += u64::from(module.xp_value);
            thresholds.module_counts[i] += 1;
        }
        thresholds
    }

    /// XP of all modules at exactly `level`
    pub fn level_total(&self, level: Level) -> u64 {
        self.totals[level.index()]
    }

    /// XP of all modules up to and including `level`
    pub fn cumulative(&self, level: Level) -> u64 {
        self.totals[..=level.index()].iter().sum()
    }

    pub fn module_count(&self, level: Level) -> usize {
        self.module_counts[level.index()]
    }
}

/// One entry of the level priority chain: when every module of `bucket` is
/// completed the user is at `reached`.
struct LevelRule {
    bucket: Level,
    reached: Level,
}

// Evaluated top to bottom, first match wins. Later rules assume the earlier
// ones did not match; do not reorder. Finishing beginner promotes straight
// to intermediate.
const LEVEL_RULES: [LevelRule; 4] = [
    LevelRule { bucket: Level::Expert, reached: Level::Expert },
    LevelRule { bucket: Level::Advanced, reached: Level::Advanced },
    LevelRule { bucket: Level::Intermediate, reached: Level::Intermediate },
    LevelRule { bucket: Level::Beginner, reached: Level::Intermediate },
];

fn completed_ids(progress: &[ProgressRecord]) -> HashSet<&str> {
    progress
        .iter()
        .filter(|p| p.completed)
        .map(|p| p.module_id.as_str())
        .collect()
}

fn percent(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    (numerator as f64 / denominator as f64 * 100.0).clamp(0.0, 100.0)
}

/// Compute the user's level summary
pub fn compute_stats(catalog: &Catalog, progress: &[ProgressRecord]) -> LevelStats {
    if progress.is_empty() {
        return LevelStats::default();
    }

    let total_xp = progress::total_xp(progress);
    let thresholds = LevelThresholds::from_catalog(catalog);
    let completed = completed_ids(progress);

    // An empty bucket never matches; it cannot be "fully completed" here
    let bucket_done = |level: Level| {
        thresholds.module_count(level) > 0
            && catalog
                .modules_at(level)
                .all(|m| completed.contains(m.id.as_str()))
    };

    let current_level = LEVEL_RULES
        .iter()
        .find(|rule| bucket_done(rule.bucket))
        .map(|rule| rule.reached)
        .unwrap_or(Level::Beginner);

    match current_level.next() {
        None => LevelStats {
            current_level,
            total_xp,
            level_progress: 100.0,
            next_level: None,
            next_level_xp: thresholds.cumulative(Level::Expert),
        },
        Some(next) => {
            let next_level_xp = thresholds.cumulative(next);
            LevelStats {
                current_level,
                total_xp,
                level_progress: percent(total_xp, next_level_xp),
                next_level: Some(next),
                next_level_xp,
            }
        }
    }
}

/// Whether `module_id` may be started at `current_level`.
///
/// Modules above the current level are locked. Within a (topic, level) lane
/// the first module is open and each later one opens once its predecessor
/// is completed. Unknown modules are locked.
pub fn is_module_unlocked(
    module_id: &str,
    catalog: &Catalog,
    progress: &[ProgressRecord],
    current_level: Level,
) -> bool {
    let Some(module) = catalog.module(module_id) else {
        return false;
    };
    if module.level > current_level {
        return false;
    }

    let lane = catalog.lane(&module.topic_id, module.level);
    match lane.iter().position(|m| m.id == module.id) {
        Some(0) | None => true,
        Some(pos) => progress::is_completed(progress, &lane[pos - 1].id),
    }
}

/// What the presentation layer shows on a module card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Locked,
    Unlocked,
    Completed,
}

/// State of every catalog module, in catalog order
pub fn module_states(
    catalog: &Catalog,
    progress: &[ProgressRecord],
    current_level: Level,
) -> Vec<(ModuleId, ModuleState)> {
    let completed = completed_ids(progress);
    catalog
        .modules()
        .iter()
        .map(|m| {
            let state = if completed.contains(m.id.as_str()) {
                ModuleState::Completed
            } else if is_module_unlocked(&m.id, catalog, progress, current_level) {
                ModuleState::Unlocked
            } else {
                ModuleState::Locked
            };
            (m.id.clone(), state)
        })
        .collect()
}

/// Completion summary for one topic card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub topic_id: TopicId,
    pub completed_modules: usize,
    pub total_modules: usize,
    pub xp_earned: u64,
    pub xp_available: u64,
}

/// Per-topic completion counts, in topic order
pub fn topic_overview(catalog: &Catalog, progress: &[ProgressRecord]) -> Vec<TopicProgress> {
    let completed = completed_ids(progress);
    catalog
        .topics()
        .iter()
        .map(|topic| {
            let modules: Vec<_> = catalog
                .modules()
                .iter()
                .filter(|m| m.topic_id == topic.id)
                .collect();
            TopicProgress {
                topic_id: topic.id.clone(),
                completed_modules: modules
                    .iter()
                    .filter(|m| completed.contains(m.id.as_str()))
                    .count(),
                total_modules: modules.len(),
                xp_earned: progress
                    .iter()
                    .filter(|p| p.topic_id == topic.id)
                    .map(|p| u64::from(p.xp_earned))
                    .sum(),
                xp_available: modules.iter().map(|m| u64::from(m.xp_value)).sum(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Module, Topic};
    use chrono::{TimeZone, Utc};

    fn module(id: &str, topic: &str, level: Level, sort: i64, xp: u32) -> Module {
        Module {
            id: id.to_string(),
            topic_id: topic.to_string(),
            level,
            name: id.to_string(),
            description: String::new(),
            sort_order: sort,
            xp_value: xp,
            questions: Vec::new(),
        }
    }

    fn record(catalog: &Catalog, id: &str, completed: bool, xp: u32) -> ProgressRecord {
        let m = catalog.module(id).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ProgressRecord {
            user_id: "u1".to_string(),
            module_id: m.id.clone(),
            topic_id: m.topic_id.clone(),
            level: m.level,
            score: if completed { 100 } else { 40 },
            xp_earned: xp,
            completed,
            attempts: 1,
            completed_at: completed.then_some(now),
            updated_at: now,
        }
    }

    fn done(catalog: &Catalog, id: &str) -> ProgressRecord {
        let xp = catalog.module(id).unwrap().xp_value;
        record(catalog, id, true, xp)
    }

    /// beginner 10+20, intermediate 30, advanced 40, expert 50
    fn full_catalog() -> Catalog {
        Catalog::new(
            vec![Topic {
                id: "budgeting".to_string(),
                name: "Budgeting".to_string(),
                description: String::new(),
                icon: "wallet".to_string(),
                sort_order: 1,
            }],
            vec![
                module("b1", "budgeting", Level::Beginner, 1, 10),
                module("b2", "budgeting", Level::Beginner, 2, 20),
                module("i1", "budgeting", Level::Intermediate, 1, 30),
                module("a1", "budgeting", Level::Advanced, 1, 40),
                module("e1", "budgeting", Level::Expert, 1, 50),
            ],
        )
    }

    #[test]
    fn empty_progress_is_zero_state() {
        let stats = compute_stats(&full_catalog(), &[]);
        assert_eq!(stats, LevelStats::default());
        assert_eq!(stats.next_level_xp, 0);
    }

    #[test]
    fn thresholds_are_cumulative() {
        let t = LevelThresholds::from_catalog(&full_catalog());
        assert_eq!(t.cumulative(Level::Beginner), 30);
        assert_eq!(t.cumulative(Level::Intermediate), 60);
        assert_eq!(t.cumulative(Level::Advanced), 100);
        assert_eq!(t.cumulative(Level::Expert), 150);
        assert_eq!(t.level_total(Level::Advanced), 40);
    }

    #[test]
    fn partial_beginner_stays_beginner() {
        let catalog = full_catalog();
        let stats = compute_stats(&catalog, &[done(&catalog, "b1")]);
        assert_eq!(stats.current_level, Level::Beginner);
        assert_eq!(stats.next_level, Some(Level::Intermediate));
        assert_eq!(stats.next_level_xp, 60);
        assert!((stats.level_progress - 10.0 / 60.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn finishing_beginner_auto_advances() {
        let catalog = full_catalog();
        let stats = compute_stats(&catalog, &[done(&catalog, "b1"), done(&catalog, "b2")]);
        assert_eq!(stats.current_level, Level::Intermediate);
        assert_eq!(stats.next_level, Some(Level::Advanced));
        assert_eq!(stats.next_level_xp, 100);
        assert!((stats.level_progress - 30.0).abs() < 1e-9);
    }

    #[test]
    fn advanced_done_points_at_expert() {
        let catalog = full_catalog();
        let stats = compute_stats(&catalog, &[done(&catalog, "a1")]);
        assert_eq!(stats.current_level, Level::Advanced);
        assert_eq!(stats.next_level, Some(Level::Expert));
        assert_eq!(stats.next_level_xp, 150);
    }

    #[test]
    fn expert_done_is_terminal() {
        let catalog = full_catalog();
        let stats = compute_stats(&catalog, &[done(&catalog, "e1")]);
        assert_eq!(stats.current_level, Level::Expert);
        assert_eq!(stats.next_level, None);
        assert_eq!(stats.level_progress, 100.0);
        assert_eq!(stats.next_level_xp, 150);
    }

    #[test]
    fn total_xp_counts_incomplete_records() {
        let catalog = full_catalog();
        let progress = vec![record(&catalog, "b1", false, 7), done(&catalog, "b2")];
        let reversed: Vec<_> = progress.iter().rev().cloned().collect();

        assert_eq!(compute_stats(&catalog, &progress).total_xp, 27);
        assert_eq!(compute_stats(&catalog, &reversed).total_xp, 27);
    }

    #[test]
    fn empty_buckets_are_skipped_without_dividing_by_zero() {
        let catalog = Catalog::new(Vec::new(), vec![module("a1", "t", Level::Advanced, 1, 0)]);
        let stats = compute_stats(&catalog, &[record(&catalog, "a1", false, 0)]);
        assert_eq!(stats.current_level, Level::Beginner);
        assert_eq!(stats.next_level_xp, 0);
        assert_eq!(stats.level_progress, 0.0);
    }

    #[test]
    fn huge_xp_values_do_not_overflow() {
        let catalog = Catalog::new(
            Vec::new(),
            vec![
                module("b1", "retirement", Level::Beginner, 1, 3_000_000_000),
                module("b2", "retirement", Level::Beginner, 2, 3_000_000_000),
                module("i1", "retirement", Level::Intermediate, 1, u32::MAX),
            ],
        );
        let t = LevelThresholds::from_catalog(&catalog);
        assert_eq!(t.level_total(Level::Beginner), 6_000_000_000);
        assert_eq!(t.cumulative(Level::Intermediate), 6_000_000_000 + u64::from(u32::MAX));

        let progress = vec![done(&catalog, "b1"), done(&catalog, "b2")];
        let stats = compute_stats(&catalog, &progress);
        assert_eq!(stats.current_level, Level::Intermediate);
        assert_eq!(stats.total_xp, 6_000_000_000);
        assert_eq!(stats.next_level_xp, 6_000_000_000 + u64::from(u32::MAX));
        assert!(stats.level_progress > 50.0 && stats.level_progress < 100.0);

        let overview = topic_overview(
            &Catalog::new(
                vec![Topic {
                    id: "retirement".to_string(),
                    name: "Retirement".to_string(),
                    description: String::new(),
                    icon: String::new(),
                    sort_order: 1,
                }],
                catalog.modules().to_vec(),
            ),
            &progress,
        );
        assert_eq!(overview[0].xp_earned, 6_000_000_000);
    }

    #[test]
    fn progress_is_clamped() {
        let catalog = full_catalog();
        let stats = compute_stats(&catalog, &[record(&catalog, "b1", false, 500)]);
        assert_eq!(stats.level_progress, 100.0);
    }

    #[test]
    fn lane_gating() {
        let catalog = full_catalog();
        assert!(is_module_unlocked("b1", &catalog, &[], Level::Beginner));
        assert!(!is_module_unlocked("b2", &catalog, &[], Level::Beginner));

        let failed = vec![record(&catalog, "b1", false, 0)];
        assert!(!is_module_unlocked("b2", &catalog, &failed, Level::Beginner));

        let passed = vec![done(&catalog, "b1")];
        assert!(is_module_unlocked("b2", &catalog, &passed, Level::Beginner));
    }

    #[test]
    fn levels_above_current_are_locked() {
        let catalog = full_catalog();
        assert!(!is_module_unlocked("i1", &catalog, &[], Level::Beginner));
        assert!(is_module_unlocked("i1", &catalog, &[], Level::Intermediate));
        // lower levels stay open
        assert!(is_module_unlocked("b1", &catalog, &[], Level::Expert));
        assert!(!is_module_unlocked("nope", &catalog, &[], Level::Expert));
    }

    #[test]
    fn topics_unlock_independently() {
        let catalog = Catalog::new(
            Vec::new(),
            vec![
                module("b1", "budgeting", Level::Beginner, 1, 10),
                module("b2", "budgeting", Level::Beginner, 2, 10),
                module("s1", "saving", Level::Beginner, 1, 10),
                module("s2", "saving", Level::Beginner, 2, 10),
            ],
        );
        let progress = vec![done(&catalog, "b1")];
        assert!(is_module_unlocked("b2", &catalog, &progress, Level::Beginner));
        assert!(is_module_unlocked("s1", &catalog, &progress, Level::Beginner));
        assert!(!is_module_unlocked("s2", &catalog, &progress, Level::Beginner));
    }

    #[test]
    fn module_states_and_overview() {
        let catalog = full_catalog();
        let progress = vec![done(&catalog, "b1")];
        let states = module_states(&catalog, &progress, Level::Beginner);

        assert_eq!(states[0], ("b1".to_string(), ModuleState::Completed));
        assert_eq!(states[1], ("b2".to_string(), ModuleState::Unlocked));
        assert_eq!(states[2], ("i1".to_string(), ModuleState::Locked));

        let overview = topic_overview(&catalog, &progress);
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].completed_modules, 1);
        assert_eq!(overview[0].total_modules, 5);
        assert_eq!(overview[0].xp_earned, 10);
        assert_eq!(overview[0].xp_available, 150);
    }
}
