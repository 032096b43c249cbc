use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a run, a group, a script or a single variant. The same ordering
/// applies at every level: Queued → Running → one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Queued,
    Running,
    Success,
    /// Completed but the query produced no rows.
    NoData,
    Failed,
    Cancelled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Success | Status::NoData | Status::Failed | Status::Cancelled
        )
    }
}

/// Identity of the requester and the scoping the run executes under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub login: String,
    pub database_id: String,
    pub manager_id: String,
    pub stream_id: String,
}

/// The user's request: which groups and scripts to execute, and how to
/// project their output. Immutable once a run starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSelection {
    pub groups: Vec<GroupSelection>,
}

impl RunSelection {
    /// Finds the enabled selection entry for a script, if any.
    pub fn enabled_script(&self, group_id: &str, script_id: &str) -> Option<&ScriptSelection> {
        self.groups
            .iter()
            .find(|g| g.group_id == group_id && g.enabled)?
            .scripts
            .iter()
            .find(|s| s.script_id == script_id && s.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSelection {
    pub group_id: String,
    pub enabled: bool,
    pub scripts: Vec<ScriptSelection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSelection {
    pub script_id: String,
    pub enabled: bool,
    pub export_mode: ExportMode,
    #[serde(default)]
    pub selected_column_item_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    DefaultColumns,
    CustomColumns,
}

/// One run of a selection. Owned by the engine; callers only ever see
/// snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: String,
    pub user_context: UserContext,
    pub selection: RunSelection,
    pub status: Status,
    /// group id → aggregated status.
    pub group_statuses: HashMap<String, Status>,
    /// group id → script id → aggregated status.
    pub script_statuses: HashMap<String, HashMap<String, Status>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One unit of work: a single variant of a single script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantTask {
    pub group_id: String,
    pub script_id: String,
    pub variant_id: String,
    pub sql_file: String,
    /// The lane this unit executes in, declared by the script's catalog entry.
    pub lane: usize,
    pub columns_profile_id: Option<String>,
    /// Zero-based position of this variant within its script.
    pub variant_index: usize,
    /// Total variants declared for the script; script aggregation fires when
    /// this many outcomes have been recorded.
    pub variant_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!Status::Queued.is_terminal());
        assert!(!Status::Running.is_terminal());
        assert!(Status::Success.is_terminal());
        assert!(Status::NoData.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(Status::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Status::NoData).unwrap(), "\"no_data\"");
    }

    #[test]
    fn test_enabled_script_lookup() {
        let selection = RunSelection {
            groups: vec![GroupSelection {
                group_id: "g1".to_string(),
                enabled: true,
                scripts: vec![
                    ScriptSelection {
                        script_id: "s1".to_string(),
                        enabled: true,
                        export_mode: ExportMode::DefaultColumns,
                        selected_column_item_ids: vec![],
                    },
                    ScriptSelection {
                        script_id: "s2".to_string(),
                        enabled: false,
                        export_mode: ExportMode::DefaultColumns,
                        selected_column_item_ids: vec![],
                    },
                ],
            }],
        };
        assert!(selection.enabled_script("g1", "s1").is_some());
        assert!(selection.enabled_script("g1", "s2").is_none());
        assert!(selection.enabled_script("g2", "s1").is_none());
    }
}
