//! Data source abstraction.
//!
//! The engine only needs a narrow contract from the database layer: open a
//! session for a database, execute SQL, stream back text lines. The real
//! backend lives behind these traits so runs can execute against a mock
//! during development and testing.

mod mock;

pub use mock::{MockSession, MockSessionFactory};

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasourceError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// A stream of result lines from a query.
pub type LineStream = BoxStream<'static, Result<String, DatasourceError>>;

/// An open session against one database.
///
/// Implementations must not yield lines after the session is dropped and
/// must surface cancellation promptly when the consumer stops polling.
#[async_trait]
pub trait DataSession: Send + Sync {
    /// Executes SQL and streams the result as text lines.
    async fn execute_query(&self, sql: &str) -> Result<LineStream, DatasourceError>;
}

/// Opens sessions against a database identified by id.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(
        &self,
        database_id: &str,
    ) -> Result<Box<dyn DataSession>, DatasourceError>;
}
