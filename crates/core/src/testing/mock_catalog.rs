//! Mock catalog provider for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, CatalogProvider, ColumnsCatalog, ScriptsCatalog};

/// Mock implementation of [`CatalogProvider`].
///
/// Serves configurable in-memory catalogs and can be told to fail the next
/// read, to exercise the engine's setup failure path.
pub struct MockCatalogProvider {
    scripts: Arc<RwLock<ScriptsCatalog>>,
    columns: Arc<RwLock<ColumnsCatalog>>,
    fail_next: Arc<RwLock<bool>>,
}

impl Default for MockCatalogProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalogProvider {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(RwLock::new(ScriptsCatalog::default())),
            columns: Arc::new(RwLock::new(ColumnsCatalog::default())),
            fail_next: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn set_scripts(&self, scripts: ScriptsCatalog) {
        *self.scripts.write().await = scripts;
    }

    pub async fn set_columns(&self, columns: ColumnsCatalog) {
        *self.columns.write().await = columns;
    }

    /// The next catalog read fails with a read error.
    pub async fn fail_next_read(&self) {
        *self.fail_next.write().await = true;
    }

    async fn take_failure(&self) -> Option<CatalogError> {
        let mut fail = self.fail_next.write().await;
        if *fail {
            *fail = false;
            Some(CatalogError::ReadFailed {
                path: PathBuf::from("mock-catalog"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
            })
        } else {
            None
        }
    }
}

#[async_trait]
impl CatalogProvider for MockCatalogProvider {
    async fn scripts(&self) -> Result<ScriptsCatalog, CatalogError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        Ok(self.scripts.read().await.clone())
    }

    async fn columns(&self) -> Result<ColumnsCatalog, CatalogError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        Ok(self.columns.read().await.clone())
    }
}
