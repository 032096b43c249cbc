//! Script and columns catalogs.
//!
//! The catalog describes what can be exported: groups of scripts, each with
//! a fixed set of SQL variants and an optional columns profile for custom
//! projection. Catalogs are read-only from the engine's point of view and
//! are assumed to change only between runs.

mod json;
mod types;

pub use json::JsonCatalogProvider;
pub use types::*;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse catalog file {path}: {message}")]
    ParseFailed { path: PathBuf, message: String },
}

/// Read-only source of the scripts and columns catalogs.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Returns the group/script/variant tree.
    async fn scripts(&self) -> Result<ScriptsCatalog, CatalogError>;

    /// Returns the columns profiles and serialization rules.
    async fn columns(&self) -> Result<ColumnsCatalog, CatalogError>;
}
