use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::info;

use crate::error::{CovtrendError, Result};
use crate::store::{SnapshotStore, StoredBlob};

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = include_str!("../schema.sql");

/// Open (or create) the history database at the given path.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

/// Ensure the schema is initialized. Safe to call on an already-initialized DB.
/// Any on-disk version other than `SCHEMA_VERSION` is rejected.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: u32 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
    if count == 0 {
        info!("Initializing history schema version {SCHEMA_VERSION}");
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        return Ok(());
    }

    let version: u32 = conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })?;
    if version > SCHEMA_VERSION {
        return Err(CovtrendError::Other(format!(
            "History database schema version {} is newer than this binary supports ({}). \
             Please upgrade covtrend.",
            version, SCHEMA_VERSION
        )));
    }
    if version < SCHEMA_VERSION {
        return Err(CovtrendError::Other(format!(
            "No migration path from schema version {} to {}. \
             Consider deleting the history database.",
            version, SCHEMA_VERSION
        )));
    }
    Ok(())
}

/// Record `blob` against `commit_id`. Re-recording a commit replaces its
/// blob but keeps its position in the history.
pub fn upsert_snapshot(conn: &Connection, commit_id: &str, blob: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO snapshot (commit_id, blob, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(commit_id) DO UPDATE SET blob = excluded.blob, created_at = excluded.created_at",
        params![commit_id, blob, now],
    )?;
    Ok(())
}

/// Nearest snapshot at or before `start_ref` (in recording order) whose blob
/// contains `marker`. An unknown `start_ref` yields `None`.
pub fn find_preceding(conn: &Connection, start_ref: &str, marker: &str) -> Result<Option<StoredBlob>> {
    let start_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM snapshot WHERE commit_id = ?1",
            params![start_ref],
            |row| row.get(0),
        )
        .optional()?;
    let Some(start_id) = start_id else {
        return Ok(None);
    };

    let found = conn
        .query_row(
            "SELECT commit_id, blob FROM snapshot
             WHERE id <= ?1 AND instr(blob, ?2) > 0
             ORDER BY id DESC
             LIMIT 1",
            params![start_id, marker],
            |row| {
                Ok(StoredBlob {
                    commit_id: row.get(0)?,
                    blob: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(found)
}

/// One row of recorded history.
#[derive(Debug)]
pub struct SnapshotRow {
    pub commit_id: String,
    pub created_at: String,
    pub blob: String,
}

/// All recorded snapshots, oldest first.
pub fn list_snapshots(conn: &Connection) -> Result<Vec<SnapshotRow>> {
    let mut stmt = conn.prepare("SELECT commit_id, created_at, blob FROM snapshot ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(SnapshotRow {
            commit_id: row.get(0)?,
            created_at: row.get(1)?,
            blob: row.get(2)?,
        })
    })?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

/// [`SnapshotStore`] backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::new(open(path)?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SnapshotStore for SqliteStore {
    fn put(&self, commit_id: &str, blob: &str) -> Result<()> {
        upsert_snapshot(&self.conn, commit_id, blob)
    }

    fn find_preceding_matching(&self, start_ref: &str, marker: &str) -> Result<Option<StoredBlob>> {
        find_preceding(&self.conn, start_ref, marker)
    }
}
