use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::fmt::Write;
use std::sync::Arc;

use super::Tool;
use crate::database::BearDatabase;

const DEFAULT_LIMIT: usize = 10;
const ENCODING_NOTE: &str =
    "Note content is stored in CloudKit's binary encoding; use search_notes to search note text.";

/// Reports whether Bear's record cache is readable and how much it holds.
pub struct CheckDatabase {
    db: Arc<BearDatabase>,
}

impl CheckDatabase {
    pub fn new(db: Arc<BearDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Tool for CheckDatabase {
    type Input = Value;
    type Output = String;

    fn name(&self) -> &str {
        "check_bear_database"
    }

    fn description(&self) -> &str {
        "Check Bear database accessibility and get basic stats"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": [] })
    }

    async fn run(&self, _args: Value) -> Result<String> {
        if !self.db.exists() {
            return Ok(format!("Bear database not found at {}", self.db.path().display()));
        }

        let db = self.db.clone();
        let stats = tokio::task::spawn_blocking(move || db.stats()).await??;
        Ok(format!(
            "Bear database found at {}\nTotal records: {}\nNote records: {}\n\n{}",
            self.db.path().display(),
            stats.records,
            stats.notes,
            ENCODING_NOTE
        ))
    }
}

/// Lists note record metadata (IDs, modification dates, sizes).
pub struct ListNotes {
    db: Arc<BearDatabase>,
}

impl ListNotes {
    pub fn new(db: Arc<BearDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Tool for ListNotes {
    type Input = Value;
    type Output = String;

    fn name(&self) -> &str {
        "list_notes_basic"
    }

    fn description(&self) -> &str {
        "Get basic information about notes from the Bear database (IDs, dates, sizes)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "How many notes to show (default: 10)"
                }
            },
            "required": []
        })
    }

    async fn run(&self, args: Value) -> Result<String> {
        if !self.db.exists() {
            bail!("Bear database not found at {}", self.db.path().display());
        }
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_LIMIT, |n| n as usize);

        let db = self.db.clone();
        let notes = tokio::task::spawn_blocking(move || db.notes()).await??;
        log::info!("Listed {} note record(s) from the Bear database", notes.len());

        let mut out = format!("Found {} notes in database:\n\n", notes.len());
        for (index, note) in notes.iter().take(limit).enumerate() {
            let modified = note
                .modified
                .map_or_else(|| "unknown".to_string(), |d| d.to_rfc3339());
            writeln!(out, "{}. ID: {}", index + 1, note.id)?;
            writeln!(out, "   Modified: {}", modified)?;
            writeln!(out, "   Size: {} bytes\n", note.size)?;
        }
        if notes.len() > limit {
            writeln!(out, "... and {} more notes\n", notes.len() - limit)?;
        }
        out.push_str(ENCODING_NOTE);
        Ok(out)
    }
}
