//! Taxonomy lookup: classification label to persisted category id.
//!
//! The pipeline depends only on the [`TaxonomyLookup`] capability, so the
//! core never hardcodes label strings against a persistence schema. A
//! SQLite adapter over the `aircraft_types` table is provided for deployed
//! setups; the in-memory variant serves tests and fixed CLI runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Persisted identifier of one taxonomy category.
pub type CategoryId = i64;

/// Errors from a taxonomy backend.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// The backend failed to answer the query.
    #[error("taxonomy query failed: {0}")]
    Query(String),
}

/// Capability to map a canonical lowercase label to its category id.
pub trait TaxonomyLookup: Send + Sync {
    /// Return the category id for a label, `None` when unmapped.
    fn find_category_id(&self, label: &str) -> Result<Option<CategoryId>, TaxonomyError>;
}

/// Fixed in-memory taxonomy.
#[derive(Debug, Default, Clone)]
pub struct StaticTaxonomy {
    entries: HashMap<String, CategoryId>,
}

impl StaticTaxonomy {
    /// Build from (label, id) pairs; labels are stored lowercase.
    pub fn from_entries<L: Into<String>>(
        entries: impl IntoIterator<Item = (L, CategoryId)>,
    ) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(label, id)| (label.into().to_ascii_lowercase(), id))
                .collect(),
        }
    }
}

impl TaxonomyLookup for StaticTaxonomy {
    fn find_category_id(&self, label: &str) -> Result<Option<CategoryId>, TaxonomyError> {
        Ok(self.entries.get(&label.to_ascii_lowercase()).copied())
    }
}

/// SQLite-backed taxonomy over the `aircraft_types` table.
pub struct SqliteTaxonomy {
    conn: Mutex<Connection>,
}

impl SqliteTaxonomy {
    /// Open (creating the schema if needed) a taxonomy database on disk.
    pub fn open(path: &Path) -> Result<Self, TaxonomyError> {
        let conn = Connection::open(path).map_err(query_error)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory taxonomy database.
    pub fn open_in_memory() -> Result<Self, TaxonomyError> {
        let conn = Connection::open_in_memory().map_err(query_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, TaxonomyError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS aircraft_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT
            );",
        )
        .map_err(query_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert (or fetch) a category by name; names are stored lowercase.
    pub fn register(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<CategoryId, TaxonomyError> {
        let name = name.to_ascii_lowercase();
        let conn = self.conn.lock().unwrap_or_else(|err| err.into_inner());
        conn.execute(
            "INSERT OR IGNORE INTO aircraft_types (name, description) VALUES (?1, ?2)",
            params![name, description],
        )
        .map_err(query_error)?;
        conn.query_row(
            "SELECT id FROM aircraft_types WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .map_err(query_error)
    }
}

impl TaxonomyLookup for SqliteTaxonomy {
    fn find_category_id(&self, label: &str) -> Result<Option<CategoryId>, TaxonomyError> {
        let conn = self.conn.lock().unwrap_or_else(|err| err.into_inner());
        conn.query_row(
            "SELECT id FROM aircraft_types WHERE name = ?1",
            params![label.to_ascii_lowercase()],
            |row| row.get(0),
        )
        .optional()
        .map_err(query_error)
    }
}

fn query_error(err: rusqlite::Error) -> TaxonomyError {
    TaxonomyError::Query(err.to_string())
}
