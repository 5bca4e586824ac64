//! Operator CLI: seed the catalog and inspect or record learner progress

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use finquest_core::{
    import_catalog_file, EngineConfig, ImportKind, LearningService, LearningStore, ModuleState,
    SqliteStore,
};

#[derive(Parser)]
#[command(name = "finquest", about = "FinQuest learning progression tools", version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "finquest.toml")]
    config: PathBuf,

    /// Overrides the database path from the config
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Topics,
    Modules,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init,
    /// Seed topics or modules from a CSV or XLSX file
    Import {
        #[arg(value_enum)]
        kind: Kind,
        file: PathBuf,
    },
    /// List topics and modules
    Catalog,
    /// Show a learner's level and XP
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Show which modules a learner can take
    Modules {
        #[arg(long)]
        user: String,
    },
    /// Record a quiz score for a learner
    Record {
        #[arg(long)]
        user: String,
        #[arg(long)]
        module: String,
        #[arg(long)]
        score: u8,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    finquest_core::logging::init(&config.logging.level);

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage.database_path));
    let mut store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match cli.command {
        Command::Init => {
            println!("Database ready at {}", db_path.display());
        }
        Command::Import { kind, file } => {
            let kind = match kind {
                Kind::Topics => ImportKind::Topics,
                Kind::Modules => ImportKind::Modules,
            };
            let count = import_catalog_file(&mut store, &file, kind)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!("Imported {} rows from {}", count, file.display());
        }
        Command::Catalog => {
            let modules = store.list_modules()?;
            for topic in store.list_topics()? {
                println!("{} ({})", topic.name, topic.id);
                for m in modules.iter().filter(|m| m.topic_id == topic.id) {
                    println!(
                        "  [{:<12}] {:<32} {:>4} XP  {} questions",
                        m.level.as_str(),
                        m.name,
                        m.xp_value,
                        m.questions.len()
                    );
                }
            }
        }
        Command::Stats { user } => {
            let mut service = LearningService::new(store, Some(user), config.quiz);
            let stats = service.stats()?;
            println!("Level:    {}", stats.current_level);
            println!("XP:       {}", stats.total_xp);
            match stats.next_level {
                Some(next) => println!(
                    "Next:     {} at {} XP ({:.1}%)",
                    next, stats.next_level_xp, stats.level_progress
                ),
                None => println!("Next:     - (top level reached)"),
            }
            for topic in service.topic_overview()? {
                println!(
                    "  {:<20} {}/{} modules, {}/{} XP",
                    topic.topic_id,
                    topic.completed_modules,
                    topic.total_modules,
                    topic.xp_earned,
                    topic.xp_available
                );
            }
        }
        Command::Modules { user } => {
            let mut service = LearningService::new(store, Some(user), config.quiz);
            for (id, state) in service.module_states()? {
                let mark = match state {
                    ModuleState::Completed => "done",
                    ModuleState::Unlocked => "open",
                    ModuleState::Locked => "locked",
                };
                println!("{:<8} {}", mark, id);
            }
        }
        Command::Record { user, module, score } => {
            let mut service = LearningService::new(store, Some(user), config.quiz);
            let record = service.save_score(&module, score)?;
            println!(
                "Saved {}: score {}, {} XP, attempt {}{}",
                record.module_id,
                record.score,
                record.xp_earned,
                record.attempts,
                if record.completed { ", completed" } else { "" }
            );
            let stats = service.stats()?;
            println!("Level {} with {} XP", stats.current_level, stats.total_xp);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_are_the_documented_ones() {
        let cli = Cli::command();
        let names: Vec<_> = cli.get_subcommands().map(|c| c.get_name()).collect();
        assert_eq!(names, ["init", "import", "catalog", "stats", "modules", "record"]);
    }

    #[test]
    fn record_parses_user_module_and_score() {
        let cli = Cli::try_parse_from([
            "finquest", "--db", "test.db", "record", "--user", "alice", "--module", "budget-basics", "--score", "85",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("test.db")));
        assert!(matches!(
            cli.command,
            Command::Record { ref user, ref module, score: 85 } if user == "alice" && module == "budget-basics"
        ));
        assert!(Cli::try_parse_from(["finquest", "topics"]).is_err());
    }
}
