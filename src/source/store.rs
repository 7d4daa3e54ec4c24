//! Content index — SQLite tables listing stored contents per shuttle.
//!
//! Mirrors the upstream layout: `shuttles` maps a host to its storage
//! handle, `contents.location` holds that handle. Timestamps are written as
//! RFC 3339 text in UTC; rows in SQLite's own `YYYY-MM-DD HH:MM:SS` form are
//! read as UTC too.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{SourceError, SourceQuery, WorkSource};
use crate::model::WorkItem;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS shuttles (
        handle TEXT PRIMARY KEY,
        host TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS contents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cid TEXT NOT NULL,
        location TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_contents_location ON contents(location, created_at);
";

const REQUIRED_TABLES: [&str; 2] = ["shuttles", "contents"];

/// What `datetime()` and `CURRENT_TIMESTAMP` store, with optional fraction.
const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// The content index backed by SQLite.
pub struct ContentIndex {
    db: Mutex<Connection>,
    path: PathBuf,
}

impl ContentIndex {
    /// Open an existing index. A missing file or missing tables is an error;
    /// the auditor never provisions the index by accident.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let db = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| SourceError::Connection {
            path: path.to_path_buf(),
            source,
        })?;

        for table in REQUIRED_TABLES {
            let found: i64 = db
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |row| row.get(0),
                )
                .map_err(|source| SourceError::Connection {
                    path: path.to_path_buf(),
                    source,
                })?;
            if found == 0 {
                return Err(SourceError::MissingSchema {
                    path: path.to_path_buf(),
                    table,
                });
            }
        }

        Ok(Self {
            db: Mutex::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Open (or create) an index and make sure the tables exist.
    pub fn create(path: &Path) -> Result<Self, SourceError> {
        let db = Connection::open(path).map_err(|source| SourceError::Connection {
            path: path.to_path_buf(),
            source,
        })?;
        db.pragma_update(None, "journal_mode", "WAL")?;
        db.execute_batch(SCHEMA)?;

        Ok(Self {
            db: Mutex::new(db),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn register_shuttle(&self, handle: &str, host: &str) -> Result<(), SourceError> {
        let db = self.conn();
        db.execute(
            "INSERT OR REPLACE INTO shuttles (handle, host) VALUES (?1, ?2)",
            params![handle, host],
        )?;
        tracing::debug!(handle, host, "Shuttle registered");
        Ok(())
    }

    /// Record a stored content. Returns its row id.
    pub fn insert_content(
        &self,
        cid: &str,
        location: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64, SourceError> {
        let db = self.conn();
        db.execute(
            "INSERT INTO contents (cid, location, created_at) VALUES (?1, ?2, ?3)",
            params![cid, location, created_at.to_rfc3339_opts(SecondsFormat::Secs, true)],
        )?;
        Ok(db.last_insert_rowid())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Poisoning is ignored; SQLite keeps its own transactional state.
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WorkSource for ContentIndex {
    fn query(&self, query: &SourceQuery) -> Result<Vec<WorkItem>, SourceError> {
        query.validate()?;

        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT c.cid, c.location, c.created_at
             FROM contents AS c
             WHERE c.location = (SELECT s.handle FROM shuttles AS s WHERE s.host = ?1)
               AND date(c.created_at) BETWEEN ?2 AND ?3
             ORDER BY c.id",
        )?;

        let rows = stmt
            .query_map(
                params![
                    query.location,
                    query.from.format("%Y-%m-%d").to_string(),
                    query.to.format("%Y-%m-%d").to_string(),
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(cid, location, created_at)| -> Result<WorkItem, SourceError> {
                let created = parse_created_at(&created_at).ok_or_else(|| SourceError::InvalidRow {
                    cid: cid.clone(),
                    value: created_at.clone(),
                })?;
                Ok(WorkItem::new(cid, location, created))
            })
            .collect()
    }
}

/// RFC 3339 first, then SQLite's native text form taken as UTC.
fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, SQLITE_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
