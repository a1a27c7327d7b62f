//! Dispatch decision audit
//!
//! Every successful assignment emits one [`DispatchEvent`] to the
//! configured sink. Sinks never influence dispatch decisions; a sink
//! failure is logged by the coordinator and does not unwind a committed
//! assignment.

#![warn(missing_docs)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the assignment decision was reached
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPath {
    /// Nearest-candidate automatic matching
    Auto,
    /// Operator-chosen unit
    Manual,
}

impl DispatchPath {
    /// Stable text form used in persisted rows
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchPath::Auto => "auto",
            DispatchPath::Manual => "manual",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "auto" => Some(DispatchPath::Auto),
            "manual" => Some(DispatchPath::Manual),
            _ => None,
        }
    }
}

/// One dispatch decision, as delivered to the audit sink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchEvent {
    /// Incident that was assigned
    pub incident_id: String,
    /// Responder that was bound
    pub responder_id: String,
    /// Great-circle distance at decision time, in kilometers; absent when
    /// the chosen unit had no position on record (manual path only)
    pub distance_km: Option<f64>,
    /// Decision path
    pub path: DispatchPath,
    /// Decision timestamp in Unix milliseconds
    pub timestamp_ms: u64,
}

/// Audit sink errors
#[derive(Debug, Error)]
pub enum AuditError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Persisted row could not be mapped back to an event
    #[error("Invalid event row: {0}")]
    InvalidRow(String),
}

/// Destination for dispatch decisions
pub trait AuditSink: Send + Sync {
    /// Record one dispatch decision
    fn record_dispatch(&self, event: &DispatchEvent) -> Result<(), AuditError>;
}

/// Bounded in-memory audit buffer, for tests and operator tooling
#[derive(Debug)]
pub struct MemoryAuditLog {
    events: Mutex<VecDeque<DispatchEvent>>,
    max_buffer_size: usize,
}

impl MemoryAuditLog {
    /// Default retained event count
    pub const DEFAULT_BUFFER_SIZE: usize = 1_000;

    /// Create a buffer with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_BUFFER_SIZE)
    }

    /// Create a buffer retaining at most `max_buffer_size` events
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_buffer_size,
        }
    }

    /// Copy of the retained events, oldest first
    pub fn events(&self) -> Vec<DispatchEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().cloned().collect()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record_dispatch(&self, event: &DispatchEvent) -> Result<(), AuditError> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push_back(event.clone());
        while events.len() > self.max_buffer_size {
            events.pop_front();
        }
        Ok(())
    }
}

/// Append-only SQLite audit log
///
/// Rows carry a monotonic sequence; there are no updates or deletes. WAL
/// mode keeps appends durable without blocking readers.
pub struct SqliteAuditLog {
    conn: Mutex<Connection>,
}

impl SqliteAuditLog {
    /// Open (creating if needed) an audit database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AuditError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory audit database, for tests
    pub fn open_in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, AuditError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS dispatch_events (
                seq_no       INTEGER PRIMARY KEY AUTOINCREMENT,
                incident_id  TEXT NOT NULL,
                responder_id TEXT NOT NULL,
                distance_km  REAL,
                path         TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of recorded events
    pub fn count(&self) -> Result<u64, AuditError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: u64 =
            conn.query_row("SELECT COUNT(*) FROM dispatch_events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// The most recent events, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<DispatchEvent>, AuditError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT incident_id, responder_id, distance_km, path, timestamp_ms
             FROM dispatch_events ORDER BY seq_no DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (incident_id, responder_id, distance_km, path, timestamp_ms) = row?;
            let path = DispatchPath::parse(&path)
                .ok_or_else(|| AuditError::InvalidRow(format!("unknown path {path:?}")))?;
            events.push(DispatchEvent {
                incident_id,
                responder_id,
                distance_km,
                path,
                timestamp_ms: timestamp_ms as u64,
            });
        }
        Ok(events)
    }
}

impl AuditSink for SqliteAuditLog {
    fn record_dispatch(&self, event: &DispatchEvent) -> Result<(), AuditError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO dispatch_events
                (incident_id, responder_id, distance_km, path, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.incident_id,
                event.responder_id,
                event.distance_km,
                event.path.as_str(),
                event.timestamp_ms as i64,
            ],
        )?;
        Ok(())
    }
}
