//! JSON file backed catalog provider.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CatalogError, CatalogProvider, ColumnsCatalog, ScriptsCatalog};

/// Reads the scripts and columns catalogs from JSON files on every call.
///
/// The files are assumed to change only between runs, so there is no
/// caching or file watching here.
pub struct JsonCatalogProvider {
    scripts_path: PathBuf,
    columns_path: PathBuf,
}

impl JsonCatalogProvider {
    pub fn new(scripts_path: impl Into<PathBuf>, columns_path: impl Into<PathBuf>) -> Self {
        Self {
            scripts_path: scripts_path.into(),
            columns_path: columns_path.into(),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
        debug!(path = %path.display(), "reading catalog file");
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&raw).map_err(|e| CatalogError::ParseFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CatalogProvider for JsonCatalogProvider {
    async fn scripts(&self) -> Result<ScriptsCatalog, CatalogError> {
        Self::read_json(&self.scripts_path).await
    }

    async fn columns(&self) -> Result<ColumnsCatalog, CatalogError> {
        Self::read_json(&self.columns_path).await
    }
}
