//! Mock data source backend.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use super::{DataSession, DatasourceError, LineStream, SessionFactory};

/// Produces [`MockSession`]s; every query yields the same fixed row count.
pub struct MockSessionFactory {
    rows_per_query: usize,
}

impl MockSessionFactory {
    pub fn new(rows_per_query: usize) -> Self {
        Self { rows_per_query }
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create_session(
        &self,
        database_id: &str,
    ) -> Result<Box<dyn DataSession>, DatasourceError> {
        debug!(database_id, "opening mock session");
        Ok(Box::new(MockSession {
            rows_per_query: self.rows_per_query,
        }))
    }
}

/// A session that answers every query with `mock_row_1..=N`.
pub struct MockSession {
    rows_per_query: usize,
}

#[async_trait]
impl DataSession for MockSession {
    async fn execute_query(&self, _sql: &str) -> Result<LineStream, DatasourceError> {
        let rows = (1..=self.rows_per_query).map(|i| Ok(format!("mock_row_{i}")));
        Ok(futures::stream::iter(rows.collect::<Vec<_>>()).boxed())
    }
}
