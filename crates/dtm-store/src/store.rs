use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use dtm_core::{
    Correctness, DtmError, DtmResult, EventKind, InteractionEvent, InteractionLog, LogStats,
};

use crate::schema::init_db;

/// Bounded wait when another session holds the write lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Shared interaction log backed by a SQLite file.
pub struct SqliteLog {
    conn: Connection,
}

impl SqliteLog {
    pub fn new(path: &Path) -> DtmResult<Self> {
        Self::with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn with_busy_timeout(path: &Path, busy_timeout: Duration) -> DtmResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DtmError::Database(format!("cannot create db directory: {e}")))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| DtmError::Database(format!("cannot open database: {e}")))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| DtmError::Database(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| DtmError::Database(e.to_string()))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> DtmResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DtmError::Database(format!("cannot open in-memory db: {e}")))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

const SELECT_COLS: &str =
    "id, timestamp, participant, section, kind, details, correctness, question";

fn format_ts(ts: &DateTime<Utc>) -> String {
    // Fixed width so MIN/MAX over the text column order chronologically
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<InteractionEvent> {
    let timestamp_str: String = row.get(1)?;
    let kind_str: String = row.get(4)?;
    let correctness_str: String = row.get(6)?;

    Ok(InteractionEvent {
        id: row.get(0)?,
        timestamp: parse_ts(&timestamp_str).unwrap_or_else(Utc::now),
        participant: row.get(2)?,
        section: row.get(3)?,
        kind: kind_str
            .parse()
            .unwrap_or(EventKind::Other(kind_str.clone())),
        details: row.get(5)?,
        correctness: correctness_str
            .parse()
            .unwrap_or(Correctness::NotApplicable),
        question: row.get(7)?,
    })
}

// ---------------------------------------------------------------------------
// InteractionLog impl
// ---------------------------------------------------------------------------

impl InteractionLog for SqliteLog {
    /// The `limit` most recent events, oldest first.
    fn recent(&self, limit: usize) -> DtmResult<Vec<InteractionEvent>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM (
                     SELECT rowid AS seq, * FROM interactions ORDER BY rowid DESC LIMIT ?1
                 ) ORDER BY seq ASC"
            ))
            .map_err(|e| DtmError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], row_to_event)
            .map_err(|e| DtmError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DtmError::Database(e.to_string()))
    }

    fn append(&self, event: &InteractionEvent) -> DtmResult<()> {
        self.conn
            .execute(
                "INSERT INTO interactions (id, timestamp, participant, section, kind,
                 details, correctness, question)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.id,
                    format_ts(&event.timestamp),
                    event.participant,
                    event.section,
                    event.kind.to_string(),
                    event.details,
                    event.correctness.to_string(),
                    event.question,
                ],
            )
            .map_err(|e| DtmError::Database(e.to_string()))?;
        Ok(())
    }

    fn read_all(&self) -> DtmResult<Vec<InteractionEvent>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM interactions ORDER BY rowid ASC"
            ))
            .map_err(|e| DtmError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], row_to_event)
            .map_err(|e| DtmError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DtmError::Database(e.to_string()))
    }

    fn count(&self) -> DtmResult<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM interactions", [], |row| {
                row.get::<_, usize>(0)
            })
            .map_err(|e| DtmError::Database(e.to_string()))
    }

    fn stats(&self) -> DtmResult<LogStats> {
        let total_events = self.count()?;

        let total_participants: usize = self
            .conn
            .query_row(
                "SELECT COUNT(DISTINCT participant) FROM interactions",
                [],
                |row| row.get(0),
            )
            .map_err(|e| DtmError::Database(e.to_string()))?;

        let (oldest, newest): (Option<String>, Option<String>) = self
            .conn
            .query_row(
                "SELECT MIN(timestamp), MAX(timestamp) FROM interactions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| DtmError::Database(e.to_string()))?;

        Ok(LogStats {
            total_events,
            total_participants,
            oldest_event: oldest.as_deref().and_then(parse_ts),
            newest_event: newest.as_deref().and_then(parse_ts),
        })
    }
}
