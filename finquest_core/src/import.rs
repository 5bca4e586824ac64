//! Catalog seeding from spreadsheet files (Excel and CSV)

use calamine::{open_workbook, Data, Reader, Xlsx};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::{parse_questions, Level, Module, Topic};
use crate::db::SqliteStore;
use crate::error::{EngineError, Result};

/// Which catalog table a file seeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Topics,
    Modules,
}

/// Header row plus data rows, every cell as trimmed text
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Column positions detected from header names
#[derive(Debug, Default, Clone)]
struct Columns {
    id: Option<usize>,
    name: Option<usize>,
    description: Option<usize>,
    icon: Option<usize>,
    sort_order: Option<usize>,
    topic: Option<usize>,
    level: Option<usize>,
    xp: Option<usize>,
    questions: Option<usize>,
}

impl Columns {
    fn detect(headers: &[String]) -> Self {
        let mut cols = Columns::default();
        for (i, header) in headers.iter().enumerate() {
            let slot = match header.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
                "id" | "slug" => &mut cols.id,
                "name" | "title" => &mut cols.name,
                "description" | "summary" => &mut cols.description,
                "icon" => &mut cols.icon,
                "sort_order" | "order" | "position" => &mut cols.sort_order,
                "topic" | "topic_id" => &mut cols.topic,
                "level" | "difficulty" => &mut cols.level,
                "xp" | "xp_value" | "points" => &mut cols.xp,
                "questions" | "quiz" => &mut cols.questions,
                _ => continue,
            };
            *slot = Some(i);
        }
        cols
    }

    fn require(&self, kind: ImportKind) -> Result<()> {
        let needed: Vec<(&str, Option<usize>)> = match kind {
            ImportKind::Topics => vec![("id", self.id), ("name", self.name)],
            ImportKind::Modules => vec![
                ("id", self.id),
                ("name", self.name),
                ("topic", self.topic),
                ("level", self.level),
                ("xp", self.xp),
            ],
        };
        let missing: Vec<&str> = needed
            .iter()
            .filter(|(_, col)| col.is_none())
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Import(format!(
                "Missing required column(s): {}",
                missing.join(", ")
            )))
        }
    }
}

fn cell(row: &[String], col: Option<usize>) -> &str {
    col.and_then(|i| row.get(i)).map(|s| s.trim()).unwrap_or("")
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str, line: usize) -> Result<T> {
    // Spreadsheets hand integers back as "3.0"
    let raw = raw.strip_suffix(".0").unwrap_or(raw);
    raw.parse()
        .map_err(|_| EngineError::Import(format!("Row {}: invalid {} '{}'", line, what, raw)))
}

/// Build topics from a sheet; rows without an id are skipped
pub fn parse_topics(sheet: &Sheet) -> Result<Vec<Topic>> {
    let cols = Columns::detect(&sheet.headers);
    cols.require(ImportKind::Topics)?;

    let mut topics = Vec::new();
    for (n, row) in sheet.rows.iter().enumerate() {
        let line = n + 2;
        let id = cell(row, cols.id);
        if id.is_empty() {
            continue;
        }
        let sort_order = match cell(row, cols.sort_order) {
            "" => topics.len() as i64 + 1,
            raw => parse_number(raw, "sort order", line)?,
        };
        topics.push(Topic {
            id: id.to_string(),
            name: cell(row, cols.name).to_string(),
            description: cell(row, cols.description).to_string(),
            icon: cell(row, cols.icon).to_string(),
            sort_order,
        });
    }
    Ok(topics)
}

/// Build modules from a sheet; rows without an id are skipped
pub fn parse_modules(sheet: &Sheet) -> Result<Vec<Module>> {
    let cols = Columns::detect(&sheet.headers);
    cols.require(ImportKind::Modules)?;

    let mut modules = Vec::new();
    for (n, row) in sheet.rows.iter().enumerate() {
        let line = n + 2;
        let id = cell(row, cols.id);
        if id.is_empty() {
            continue;
        }
        let level: Level = cell(row, cols.level)
            .parse()
            .map_err(|e| EngineError::Import(format!("Row {}: {}", line, e)))?;
        let sort_order = match cell(row, cols.sort_order) {
            "" => 0,
            raw => parse_number(raw, "sort order", line)?,
        };
        let questions = match cols.questions {
            Some(_) => parse_questions(id, Some(cell(row, cols.questions))),
            None => Vec::new(),
        };
        modules.push(Module {
            id: id.to_string(),
            topic_id: cell(row, cols.topic).to_string(),
            level,
            name: cell(row, cols.name).to_string(),
            description: cell(row, cols.description).to_string(),
            sort_order,
            xp_value: parse_number(cell(row, cols.xp), "xp", line)?,
            questions,
        });
    }
    Ok(modules)
}

/// Read the first sheet of a workbook or a CSV file, picked by extension
pub fn read_sheet(file_path: &Path) -> Result<Sheet> {
    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" => read_excel(file_path),
        "csv" => read_csv(file_path),
        _ => Err(EngineError::Import(format!("Unsupported file format: .{}", extension))),
    }
}

fn read_excel(file_path: &Path) -> Result<Sheet> {
    let mut workbook: Xlsx<_> = open_workbook(file_path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| EngineError::Import("No sheets found in Excel file".to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .ok_or_else(|| EngineError::Import("Empty file - no header row".to_string()))?
        .iter()
        .map(cell_string)
        .collect();
    let rows = rows.map(|row| row.iter().map(cell_string).collect()).collect();

    Ok(Sheet { headers, rows })
}

fn read_csv(file_path: &Path) -> Result<Sheet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(file_path)?;

    let headers = reader.headers()?.iter().map(|s| s.trim().to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(|s| s.trim().to_string()).collect());
    }
    Ok(Sheet { headers, rows })
}

fn cell_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// Parse a catalog file and upsert its rows. Returns the number of rows written.
pub fn import_catalog_file(store: &mut SqliteStore, file_path: &Path, kind: ImportKind) -> Result<usize> {
    let sheet = read_sheet(file_path)?;
    let count = match kind {
        ImportKind::Topics => {
            let topics = parse_topics(&sheet)?;
            store.seed_catalog(&topics, &[])?;
            topics.len()
        }
        ImportKind::Modules => {
            let modules = parse_modules(&sheet)?;
            let empty = modules.iter().filter(|m| m.questions.is_empty()).count();
            if empty > 0 {
                warn!(count = empty, "Imported modules without questions");
            }
            store.seed_catalog(&[], &modules)?;
            modules.len()
        }
    };
    info!(path = %file_path.display(), ?kind, count, "Imported catalog file");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LearningStore;
    use std::io::Write;

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> Sheet {
        Sheet {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn topic_headers_are_detected_loosely() {
        let s = sheet(
            &["Slug", "Title", "Icon", "Order"],
            &[&["budgeting", "Budgeting", "wallet", "2"], &["", "skipped", "", ""]],
        );
        let topics = parse_topics(&s).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].id, "budgeting");
        assert_eq!(topics[0].sort_order, 2);
    }

    #[test]
    fn modules_need_level_and_xp_columns() {
        let s = sheet(&["id", "name", "topic"], &[&["b1", "Basics", "budgeting"]]);
        let err = parse_modules(&s).unwrap_err();
        assert!(err.to_string().contains("level"));
        assert!(err.to_string().contains("xp"));
    }

    #[test]
    fn bad_level_reports_row() {
        let s = sheet(
            &["id", "name", "topic", "level", "xp"],
            &[&["b1", "Basics", "budgeting", "beginner", "10"], &["b2", "More", "budgeting", "ninja", "10"]],
        );
        let err = parse_modules(&s).unwrap_err();
        assert!(err.to_string().contains("Row 3"));
    }

    #[test]
    fn float_cells_parse_as_integers() {
        let s = sheet(
            &["id", "name", "topic", "level", "xp", "sort order"],
            &[&["b1", "Basics", "budgeting", "Beginner", "10.0", "1.0"]],
        );
        let modules = parse_modules(&s).unwrap();
        assert_eq!(modules[0].xp_value, 10);
        assert_eq!(modules[0].sort_order, 1);
        assert_eq!(modules[0].level, Level::Beginner);
    }

    #[test]
    fn csv_import_round_trips_into_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modules.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "id,name,topic,level,xp,sort_order,questions").unwrap();
        writeln!(
            file,
            r#"b1,Budget basics,budgeting,beginner,10,1,"[{{""prompt"":""Needs vs wants?"",""options"":[""Rent"",""Concert""],""answer"":""Rent""}}]""#
        )
        .unwrap();
        writeln!(file, "b2,Tracking spend,budgeting,beginner,20,2,").unwrap();
        drop(file);

        let mut store = SqliteStore::open_in_memory().unwrap();
        let count = import_catalog_file(&mut store, &path, ImportKind::Modules).unwrap();
        assert_eq!(count, 2);

        let modules = store.list_modules().unwrap();
        assert_eq!(modules[0].questions.len(), 1);
        assert_eq!(modules[0].questions[0].answer, "Rent");
        assert!(modules[1].questions.is_empty());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = read_sheet(Path::new("catalog.json")).unwrap_err();
        assert!(matches!(err, EngineError::Import(_)));
    }
}
