//! Durable per-code check tally.
//!
//! One SQLite row per canonical code: how many times it was checked, when it
//! was last checked, and whether it was ever found in the index (sticky).
//! The increment is a single `INSERT ... ON CONFLICT ... RETURNING` statement
//! so concurrent bumps on the same code cannot lose updates; the engine
//! serializes writers and `busy_timeout` bounds the wait under contention.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::code::CodeKey;

const LEDGER_SCHEMA_VERSION: u32 = 1;
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// The durable store failed; the caller degrades rather than crashing the
/// request path.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger schema version mismatch: expected {expected}, got {got}")]
    SchemaVersionMismatch { expected: u32, got: String },

    #[error("timestamp round-trip failed: {0}")]
    Timestamp(String),
}

/// Post-bump state of one row, read from the same statement that wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BumpStats {
    pub count: u64,
    pub last_checked_at: OffsetDateTime,
}

/// Full row, for reads outside the bump path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRow {
    pub code: String,
    pub check_count: u64,
    pub last_checked_at: OffsetDateTime,
    pub ever_known: bool,
}

#[derive(Debug)]
pub struct CheckLedger {
    db_path: PathBuf,
}

impl CheckLedger {
    /// Open (creating if needed) the ledger database, initialize the schema,
    /// and validate the schema version. Rows never expire; retention is out of
    /// scope here.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(dir) = db_path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|source| LedgerError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let conn = open_connection(&db_path, true)?;
        let is_new = !table_exists(&conn, "meta")?;
        if is_new {
            initialize_schema(&conn)?;
        } else {
            validate_schema_version(&conn)?;
        }
        drop(conn);

        Ok(Self { db_path })
    }

    /// Atomic upsert-and-increment: insert with count=1 on first sighting,
    /// otherwise increment, refresh the timestamp, and sticky-OR the
    /// known flag. Returns the post-update count and timestamp.
    pub fn bump(&self, code: &CodeKey, is_known: bool) -> Result<BumpStats, LedgerError> {
        let conn = open_connection(&self.db_path, false)?;
        let ts = format_ts(now_utc_seconds())?;

        let (count, stored_ts): (u64, String) = conn.query_row(
            "INSERT INTO checks (code, check_count, last_checked_at, is_known) \
             VALUES (?1, 1, ?2, ?3) \
             ON CONFLICT(code) DO UPDATE SET \
               check_count = checks.check_count + 1, \
               last_checked_at = excluded.last_checked_at, \
               is_known = MAX(checks.is_known, excluded.is_known) \
             RETURNING check_count, last_checked_at",
            params![code.as_str(), ts, is_known],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(BumpStats {
            count,
            last_checked_at: parse_ts(&stored_ts)?,
        })
    }

    /// Current row for a code, if it was ever bumped.
    pub fn entry(&self, code: &CodeKey) -> Result<Option<CheckRow>, LedgerError> {
        let conn = open_connection(&self.db_path, false)?;
        let row = conn
            .query_row(
                "SELECT code, check_count, last_checked_at, is_known \
                 FROM checks WHERE code = ?1",
                params![code.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(code, check_count, ts, ever_known)| {
            Ok(CheckRow {
                code,
                check_count,
                last_checked_at: parse_ts(&ts)?,
                ever_known,
            })
        })
        .transpose()
    }
}

fn open_connection(path: &Path, create: bool) -> Result<Connection, LedgerError> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let conn = Connection::open_with_flags(path, flags)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    Ok(conn)
}

fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS checks (
           code TEXT PRIMARY KEY,
           check_count INTEGER NOT NULL DEFAULT 0,
           last_checked_at TEXT NOT NULL,
           is_known INTEGER NOT NULL DEFAULT 0
         );
         CREATE TABLE IF NOT EXISTS meta (
           key TEXT PRIMARY KEY,
           value TEXT NOT NULL
         );",
    )?;
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('ledger_schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![LEDGER_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

fn validate_schema_version(conn: &Connection) -> Result<(), LedgerError> {
    let got: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'ledger_schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match got {
        Some(v) if v == LEDGER_SCHEMA_VERSION.to_string() => Ok(()),
        Some(v) => Err(LedgerError::SchemaVersionMismatch {
            expected: LEDGER_SCHEMA_VERSION,
            got: v,
        }),
        None => Err(LedgerError::SchemaVersionMismatch {
            expected: LEDGER_SCHEMA_VERSION,
            got: "missing".to_string(),
        }),
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, LedgerError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Wall time truncated to whole seconds; stored timestamps round-trip through
/// RFC 3339 without a fractional part.
fn now_utc_seconds() -> OffsetDateTime {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .expect("zero nanosecond is in range")
}

fn format_ts(ts: OffsetDateTime) -> Result<String, LedgerError> {
    ts.format(&Rfc3339)
        .map_err(|e| LedgerError::Timestamp(e.to_string()))
}

fn parse_ts(raw: &str) -> Result<OffsetDateTime, LedgerError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| LedgerError::Timestamp(e.to_string()))
}
