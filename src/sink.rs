//! Recognition sink: fire-and-observe persistence of classification events.
//!
//! The pipeline reports every successful classification here. Sink failures
//! are logged by the caller and never invalidate a computed result.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use thiserror::Error;

use crate::taxonomy::CategoryId;

/// Origin of a classification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// One-shot uploaded file.
    File,
    /// Real-time streamed chunk.
    Realtime,
}

impl SourceKind {
    /// Stable string stored by sink backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Realtime => "realtime",
        }
    }
}

/// One classification event as reported to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRecord {
    /// Requesting user.
    pub user_id: i64,
    /// Persisted category of the winning label.
    pub category_id: CategoryId,
    /// Confidence fraction in [0, 1].
    pub confidence: f32,
    /// Wall-clock processing time of the request.
    pub processing_ms: u64,
    /// Request origin.
    pub source: SourceKind,
}

/// Errors from a sink backend.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backend failed to store the record.
    #[error("recognition sink failed: {0}")]
    Store(String),
}

/// Capability to persist one classification event.
pub trait RecognitionSink: Send + Sync {
    /// Store the record, returning its persisted id.
    fn record(&self, record: &RecognitionRecord) -> Result<i64, SinkError>;
}

/// Sink that drops every record; for tools that classify without logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl RecognitionSink for DiscardSink {
    fn record(&self, _record: &RecognitionRecord) -> Result<i64, SinkError> {
        Ok(0)
    }
}

/// SQLite-backed sink over the `recognition_log` table.
pub struct SqliteRecognitionSink {
    conn: Mutex<Connection>,
}

impl SqliteRecognitionSink {
    /// Open (creating the schema if needed) a sink database on disk.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let conn = Connection::open(path).map_err(store_error)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory sink database.
    pub fn open_in_memory() -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory().map_err(store_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS recognition_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                confidence REAL NOT NULL,
                source TEXT NOT NULL,
                processing_ms INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .map_err(store_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored records, for operator tooling and tests.
    pub fn record_count(&self) -> Result<i64, SinkError> {
        let conn = self.conn.lock().unwrap_or_else(|err| err.into_inner());
        conn.query_row("SELECT COUNT(*) FROM recognition_log", [], |row| row.get(0))
            .map_err(store_error)
    }
}

impl RecognitionSink for SqliteRecognitionSink {
    fn record(&self, record: &RecognitionRecord) -> Result<i64, SinkError> {
        let conn = self.conn.lock().unwrap_or_else(|err| err.into_inner());
        conn.execute(
            "INSERT INTO recognition_log
                (user_id, category_id, confidence, source, processing_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user_id,
                record.category_id,
                record.confidence as f64,
                record.source.as_str(),
                record.processing_ms as i64,
            ],
        )
        .map_err(store_error)?;
        Ok(conn.last_insert_rowid())
    }
}

fn store_error(err: rusqlite::Error) -> SinkError {
    SinkError::Store(err.to_string())
}
