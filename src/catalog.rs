//! Model catalog configuration.
//!
//! The set of servable model ids is closed and comes from a TOML document
//! validated at startup; the registry never consults anything else. Relative
//! artifact paths resolve against the catalog file's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default filename for the catalog document.
pub const CATALOG_FILE_NAME: &str = "catalog.toml";

/// Errors raised while loading or validating a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        /// Catalog file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The catalog document is not valid TOML for the expected shape.
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
    /// The catalog declares no models.
    #[error("Catalog declares no models")]
    Empty,
    /// A model id is blank.
    #[error("Catalog model id may not be blank")]
    BlankId,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    models: BTreeMap<String, ModelEntryFile>,
    #[serde(default)]
    taxonomy: TaxonomyFile,
}

#[derive(Debug, Deserialize)]
struct ModelEntryFile {
    path: PathBuf,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    database: Option<PathBuf>,
}

/// One configured model: artifact location plus an operator-facing note.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    /// Artifact path, absolute after catalog resolution.
    pub path: PathBuf,
    /// Optional human-readable description.
    pub description: Option<String>,
}

/// Validated catalog: the closed model id set and collaborator locations.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelEntry>,
    taxonomy_db: Option<PathBuf>,
}

impl ModelCatalog {
    /// Load and validate a catalog file, resolving relative paths against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path.parent())
    }

    /// Parse and validate a catalog document.
    pub fn from_toml_str(text: &str, base_dir: Option<&Path>) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(text)?;
        if file.models.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut models = BTreeMap::new();
        for (id, entry) in file.models {
            if id.trim().is_empty() {
                return Err(CatalogError::BlankId);
            }
            models.insert(
                id,
                ModelEntry {
                    path: resolve_path(entry.path, base_dir),
                    description: entry.description,
                },
            );
        }
        let taxonomy_db = file
            .taxonomy
            .database
            .map(|path| resolve_path(path, base_dir));
        Ok(Self {
            models,
            taxonomy_db,
        })
    }

    /// Configured (id, entry) pairs in id order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ModelEntry)> {
        self.models.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Entry for one id, if configured.
    pub fn get(&self, id: &str) -> Option<&ModelEntry> {
        self.models.get(id)
    }

    /// Configured ids in order.
    pub fn ids(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Optional taxonomy database location.
    pub fn taxonomy_db(&self) -> Option<&Path> {
        self.taxonomy_db.as_deref()
    }
}

fn resolve_path(path: PathBuf, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
