//! Run status notifications.
//!
//! The engine reports every status transition through a [`RunEventSink`].
//! Delivery is fire-and-observe: sinks handle their own failures and must
//! never let a delivery problem abort the run that produced the event.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::run::Status;

/// A status transition, in wire-friendly form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum RunEvent {
    RunStatusChanged {
        run_id: String,
        status: Status,
    },
    GroupStatusChanged {
        run_id: String,
        group_id: String,
        status: Status,
    },
    ScriptStatusChanged {
        run_id: String,
        group_id: String,
        script_id: String,
        status: Status,
        message: Option<String>,
    },
}

/// Observer of run status transitions.
#[async_trait]
pub trait RunEventSink: Send + Sync {
    async fn run_status_changed(&self, run_id: &str, status: Status);

    async fn group_status_changed(&self, run_id: &str, group_id: &str, status: Status);

    async fn script_status_changed(
        &self,
        run_id: &str,
        group_id: &str,
        script_id: &str,
        status: Status,
        message: Option<&str>,
    );
}

/// Sink that drops every event. Useful for headless and test setups.
pub struct NullEventSink;

#[async_trait]
impl RunEventSink for NullEventSink {
    async fn run_status_changed(&self, _run_id: &str, _status: Status) {}

    async fn group_status_changed(&self, _run_id: &str, _group_id: &str, _status: Status) {}

    async fn script_status_changed(
        &self,
        _run_id: &str,
        _group_id: &str,
        _script_id: &str,
        _status: Status,
        _message: Option<&str>,
    ) {
    }
}
