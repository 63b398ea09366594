use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Bear's CloudKit record cache, relative to the home directory.
pub const CLOUDKIT_RECORDS: &str = "Library/Containers/net.shinyfrog.bear/Data/CloudKit/\
c92f39c6ea98f57c13f84f9b283e7a7613347d0b/Records/Records.db";

const NOTES_ZONE: &str = "%Notes%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub records: i64,
    pub notes: i64,
}

/// What can be read about a note without decoding its CloudKit blob.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRecord {
    pub id: String,
    pub modified: Option<DateTime<Utc>>,
    pub size: i64,
}

/// Read-only view of Bear's local record cache.
///
/// Note bodies are stored in CloudKit's binary encoding, so only record
/// metadata is exposed. Every call opens its own connection.
#[derive(Debug, Clone)]
pub struct BearDatabase {
    path: PathBuf,
}

impl BearDatabase {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn open(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Connection::open_with_flags(&self.path, flags)
            .with_context(|| format!("Failed to open Bear database {}", self.path.display()))
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        let conn = self.open()?;
        let records = conn
            .query_row("SELECT COUNT(*) FROM Record", [], |row| row.get(0))
            .context("Failed to count records")?;
        let notes = conn
            .query_row(
                "SELECT COUNT(*) FROM Record WHERE zoneIdentifier LIKE ?1",
                [NOTES_ZONE],
                |row| row.get(0),
            )
            .context("Failed to count note records")?;

        log::debug!("Bear database: {} records, {} notes", records, notes);
        Ok(DatabaseStats { records, notes })
    }

    /// Note records, most recently modified first.
    pub fn notes(&self) -> Result<Vec<NoteRecord>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT recordID, modificationTime, size
                 FROM Record
                 WHERE zoneIdentifier LIKE ?1
                 ORDER BY modificationTime DESC",
            )
            .context("Failed to query note records")?;

        let notes = stmt
            .query_map([NOTES_ZONE], |row| {
                let record_id: String = row.get(0)?;
                let modified: Option<f64> = row.get(1)?;
                let size: Option<i64> = row.get(2)?;
                Ok(NoteRecord {
                    id: short_id(&record_id).to_string(),
                    modified: modified.and_then(to_datetime),
                    size: size.unwrap_or(0),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read note records")?;
        Ok(notes)
    }
}

/// CloudKit record names carry a zone suffix after the first '-'.
fn short_id(record_id: &str) -> &str {
    record_id.split('-').next().unwrap_or(record_id)
}

fn to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds as i64, 0)
}
