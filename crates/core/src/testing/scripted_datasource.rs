//! Scripted data source for testing.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::datasource::{DataSession, DatasourceError, LineStream, SessionFactory};

/// A recorded query for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub database_id: String,
    pub sql: String,
}

/// A handler producing the result lines for a query, or an error.
type QueryHandler = Box<dyn Fn(&str) -> Result<Vec<String>, DatasourceError> + Send + Sync>;

/// Mock implementation of [`SessionFactory`].
///
/// By default every query yields the configured default lines. A query
/// handler can be installed to script per-query behavior (rows, no rows,
/// errors), and an artificial per-query delay lets cancellation tests keep a
/// unit in flight.
pub struct ScriptedSessionFactory {
    default_lines: Arc<RwLock<Vec<String>>>,
    handler: Arc<RwLock<Option<QueryHandler>>>,
    queries: Arc<RwLock<Vec<RecordedQuery>>>,
    query_delay: Arc<RwLock<Option<Duration>>>,
    next_connect_error: Arc<RwLock<Option<DatasourceError>>>,
}

impl Default for ScriptedSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSessionFactory {
    pub fn new() -> Self {
        Self {
            default_lines: Arc::new(RwLock::new(vec![
                "mock_row_1".to_string(),
                "mock_row_2".to_string(),
            ])),
            handler: Arc::new(RwLock::new(None)),
            queries: Arc::new(RwLock::new(Vec::new())),
            query_delay: Arc::new(RwLock::new(None)),
            next_connect_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_default_lines(&self, lines: Vec<String>) {
        *self.default_lines.write().await = lines;
    }

    /// Installs a per-query handler. It receives the SQL text and returns
    /// the lines to yield, or an error.
    pub async fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Result<Vec<String>, DatasourceError> + Send + Sync + 'static,
    {
        *self.handler.write().await = Some(Box::new(handler));
    }

    /// Every query sleeps this long before yielding its first line.
    pub async fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.write().await = Some(delay);
    }

    /// The next `create_session` call fails.
    pub async fn fail_next_connect(&self, error: DatasourceError) {
        *self.next_connect_error.write().await = Some(error);
    }

    pub async fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.queries.read().await.clone()
    }
}

#[async_trait]
impl SessionFactory for ScriptedSessionFactory {
    async fn create_session(
        &self,
        database_id: &str,
    ) -> Result<Box<dyn DataSession>, DatasourceError> {
        if let Some(err) = self.next_connect_error.write().await.take() {
            return Err(err);
        }
        Ok(Box::new(ScriptedSession {
            database_id: database_id.to_string(),
            default_lines: Arc::clone(&self.default_lines),
            handler: Arc::clone(&self.handler),
            queries: Arc::clone(&self.queries),
            query_delay: Arc::clone(&self.query_delay),
        }))
    }
}

struct ScriptedSession {
    database_id: String,
    default_lines: Arc<RwLock<Vec<String>>>,
    handler: Arc<RwLock<Option<QueryHandler>>>,
    queries: Arc<RwLock<Vec<RecordedQuery>>>,
    query_delay: Arc<RwLock<Option<Duration>>>,
}

#[async_trait]
impl DataSession for ScriptedSession {
    async fn execute_query(&self, sql: &str) -> Result<LineStream, DatasourceError> {
        self.queries.write().await.push(RecordedQuery {
            database_id: self.database_id.clone(),
            sql: sql.to_string(),
        });

        let lines = match self.handler.read().await.as_ref() {
            Some(handler) => handler(sql)?,
            None => self.default_lines.read().await.clone(),
        };
        let delay = *self.query_delay.read().await;

        Ok(futures::stream::once(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            futures::stream::iter(lines.into_iter().map(Ok))
        })
        .flatten()
        .boxed())
    }
}
