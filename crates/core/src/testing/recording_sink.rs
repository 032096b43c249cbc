//! Event sink that records every notification for test assertions.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::events::RunEventSink;
use crate::run::Status;

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Run {
        run_id: String,
        status: Status,
    },
    Group {
        run_id: String,
        group_id: String,
        status: Status,
    },
    Script {
        run_id: String,
        group_id: String,
        script_id: String,
        status: Status,
        message: Option<String>,
    },
}

/// Mock implementation of [`RunEventSink`] that records every event in
/// arrival order.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Arc<RwLock<Vec<RecordedEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().await.clone()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    /// Statuses reported at run level, in order.
    pub async fn run_statuses(&self) -> Vec<Status> {
        self.events
            .read()
            .await
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::Run { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    /// Statuses reported for one script, in order.
    pub async fn script_statuses(&self, group_id: &str, script_id: &str) -> Vec<Status> {
        self.events
            .read()
            .await
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::Script {
                    group_id: g,
                    script_id: s,
                    status,
                    ..
                } if g == group_id && s == script_id => Some(*status),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RunEventSink for RecordingEventSink {
    async fn run_status_changed(&self, run_id: &str, status: Status) {
        self.events.write().await.push(RecordedEvent::Run {
            run_id: run_id.to_string(),
            status,
        });
    }

    async fn group_status_changed(&self, run_id: &str, group_id: &str, status: Status) {
        self.events.write().await.push(RecordedEvent::Group {
            run_id: run_id.to_string(),
            group_id: group_id.to_string(),
            status,
        });
    }

    async fn script_status_changed(
        &self,
        run_id: &str,
        group_id: &str,
        script_id: &str,
        status: Status,
        message: Option<&str>,
    ) {
        self.events.write().await.push(RecordedEvent::Script {
            run_id: run_id.to_string(),
            group_id: group_id.to_string(),
            script_id: script_id.to_string(),
            status,
            message: message.map(|m| m.to_string()),
        });
    }
}
