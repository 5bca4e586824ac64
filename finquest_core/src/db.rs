//! Database operations for the catalog and progress tables

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::{parse_level, parse_questions, Catalog, Module, Topic};
use crate::error::Result;
use crate::progress::{ProgressRecord, QuizOutcome};

/// Read/mutate boundary the engine talks to.
///
/// Every progress call is scoped to one `user_id`; implementations must never
/// return or touch rows owned by another user.
pub trait LearningStore {
    /// Topics ordered by `sort_order`
    fn list_topics(&self) -> Result<Vec<Topic>>;

    /// Modules ordered by `sort_order`, questions normalized
    fn list_modules(&self) -> Result<Vec<Module>>;

    /// All progress rows of one user, unordered
    fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>>;

    /// Insert or update the (user, module) record atomically and return it
    fn upsert_progress(
        &mut self,
        user_id: &str,
        module: &Module,
        outcome: &QuizOutcome,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord>;
}

/// Load topics and modules into a [`Catalog`]
pub fn load_catalog<S: LearningStore + ?Sized>(store: &S) -> Result<Catalog> {
    Ok(Catalog::new(store.list_topics()?, store.list_modules()?))
}

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS topics (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        icon TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS modules (
        id TEXT PRIMARY KEY,
        topic_id TEXT NOT NULL REFERENCES topics(id),
        level TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 0,
        xp_value INTEGER NOT NULL DEFAULT 0,
        questions TEXT
    );

    CREATE TABLE IF NOT EXISTS progress (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        module_id TEXT NOT NULL,
        topic_id TEXT NOT NULL,
        level TEXT NOT NULL,
        score INTEGER NOT NULL,
        xp_earned INTEGER NOT NULL DEFAULT 0,
        completed INTEGER NOT NULL DEFAULT 0,
        attempts INTEGER NOT NULL DEFAULT 1,
        completed_at TEXT,
        updated_at TEXT NOT NULL,
        UNIQUE (user_id, module_id)
    );

    CREATE INDEX IF NOT EXISTS idx_modules_lane ON modules(topic_id, level, sort_order);
    CREATE INDEX IF NOT EXISTS idx_progress_user ON progress(user_id);
";

// Completion is sticky: a failing retake overwrites score and XP but keeps
// the module completed and its original completion time.
const UPSERT_PROGRESS: &str = "
    INSERT INTO progress
        (user_id, module_id, topic_id, level, score, xp_earned, completed, attempts, completed_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)
    ON CONFLICT (user_id, module_id) DO UPDATE SET
        score = excluded.score,
        xp_earned = excluded.xp_earned,
        completed = MAX(progress.completed, excluded.completed),
        completed_at = CASE WHEN excluded.completed = 1
                            THEN excluded.completed_at
                            ELSE progress.completed_at END,
        attempts = progress.attempts + 1,
        updated_at = excluded.updated_at";

const SELECT_PROGRESS: &str = "SELECT user_id, module_id, topic_id, level, score, xp_earned, completed, attempts, completed_at, updated_at FROM progress";

/// SQLite-backed store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        // Concurrent writers wait for the lock instead of failing outright
        conn.busy_timeout(Duration::from_secs(5))?;
        info!(path = %path.display(), "Opened learning database");
        Self::initialize(conn)
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore { conn })
    }

    /// Insert or replace a topic (catalog seeding)
    pub fn insert_topic(&self, topic: &Topic) -> Result<()> {
        insert_topic(&self.conn, topic)
    }

    /// Insert or replace a module (catalog seeding)
    pub fn insert_module(&self, module: &Module) -> Result<()> {
        insert_module(&self.conn, module)
    }

    /// Insert a batch of topics and modules in one transaction
    pub fn seed_catalog(&mut self, topics: &[Topic], modules: &[Module]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for topic in topics {
            insert_topic(&tx, topic)?;
        }
        for module in modules {
            insert_module(&tx, module)?;
        }
        tx.commit()?;
        info!(topics = topics.len(), modules = modules.len(), "Seeded catalog");
        Ok(())
    }

    /// Fetch the record for one (user, module) pair
    pub fn get_progress(&self, user_id: &str, module_id: &str) -> Result<Option<ProgressRecord>> {
        let sql = format!("{} WHERE user_id = ?1 AND module_id = ?2", SELECT_PROGRESS);
        let raw = self
            .conn
            .query_row(&sql, params![user_id, module_id], RawProgress::from_row)
            .optional()?;
        raw.map(RawProgress::into_record).transpose()
    }
}

fn insert_topic(conn: &Connection, topic: &Topic) -> Result<()> {
    conn.execute(
        "INSERT INTO topics (id, name, description, icon, sort_order) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (id) DO UPDATE SET
            name = excluded.name, description = excluded.description,
            icon = excluded.icon, sort_order = excluded.sort_order",
        params![topic.id, topic.name, topic.description, topic.icon, topic.sort_order],
    )?;
    Ok(())
}

fn insert_module(conn: &Connection, module: &Module) -> Result<()> {
    let questions = serde_json::to_string(&module.questions)?;
    conn.execute(
        "INSERT INTO modules (id, topic_id, level, name, description, sort_order, xp_value, questions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (id) DO UPDATE SET
            topic_id = excluded.topic_id, level = excluded.level, name = excluded.name,
            description = excluded.description, sort_order = excluded.sort_order,
            xp_value = excluded.xp_value, questions = excluded.questions",
        params![
            module.id,
            module.topic_id,
            module.level.as_str(),
            module.name,
            module.description,
            module.sort_order,
            module.xp_value,
            questions
        ],
    )?;
    Ok(())
}

impl LearningStore for SqliteStore {
    fn list_topics(&self) -> Result<Vec<Topic>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, icon, sort_order FROM topics ORDER BY sort_order, id",
        )?;
        let topics = stmt
            .query_map([], |row| {
                Ok(Topic {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    icon: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    sort_order: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(topics)
    }

    fn list_modules(&self) -> Result<Vec<Module>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, topic_id, level, name, description, sort_order, xp_value, questions
             FROM modules ORDER BY sort_order, id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    row.get::<_, i64>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, topic_id, level, name, description, sort_order, xp_value, questions)| {
                let level = parse_level(&id, &level)?;
                let questions = parse_questions(&id, questions.as_deref());
                Ok(Module {
                    id,
                    topic_id,
                    level,
                    name,
                    description,
                    sort_order,
                    xp_value,
                    questions,
                })
            })
            .collect()
    }

    fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        let sql = format!("{} WHERE user_id = ?1", SELECT_PROGRESS);
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![user_id], RawProgress::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter().map(RawProgress::into_record).collect()
    }

    fn upsert_progress(
        &mut self,
        user_id: &str,
        module: &Module,
        outcome: &QuizOutcome,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord> {
        outcome.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            UPSERT_PROGRESS,
            params![
                user_id,
                module.id,
                module.topic_id,
                module.level.as_str(),
                outcome.score,
                outcome.xp_earned,
                outcome.completed,
                outcome.completed.then_some(now),
                now
            ],
        )?;
        let sql = format!("{} WHERE user_id = ?1 AND module_id = ?2", SELECT_PROGRESS);
        let raw = tx.query_row(&sql, params![user_id, module.id], RawProgress::from_row)?;
        tx.commit()?;

        let record = raw.into_record()?;
        debug!(
            user_id,
            module_id = %module.id,
            score = record.score,
            attempts = record.attempts,
            completed = record.completed,
            "Saved progress"
        );
        Ok(record)
    }
}

/// Progress row before the level column is validated
struct RawProgress {
    user_id: String,
    module_id: String,
    topic_id: String,
    level: String,
    score: u8,
    xp_earned: u32,
    completed: bool,
    attempts: u32,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl RawProgress {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawProgress {
            user_id: row.get(0)?,
            module_id: row.get(1)?,
            topic_id: row.get(2)?,
            level: row.get(3)?,
            score: row.get(4)?,
            xp_earned: row.get(5)?,
            completed: row.get(6)?,
            attempts: row.get(7)?,
            completed_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<ProgressRecord> {
        let level = parse_level(&self.module_id, &self.level)?;
        Ok(ProgressRecord {
            user_id: self.user_id,
            module_id: self.module_id,
            topic_id: self.topic_id,
            level,
            score: self.score,
            xp_earned: self.xp_earned,
            completed: self.completed,
            attempts: self.attempts,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
        })
    }
}
