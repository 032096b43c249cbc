//! Testing utilities and mock implementations of the engine's collaborator
//! traits, for integration tests without a real database or transport.

mod mock_catalog;
mod recording_sink;
mod scripted_datasource;

pub use mock_catalog::MockCatalogProvider;
pub use recording_sink::{RecordedEvent, RecordingEventSink};
pub use scripted_datasource::{RecordedQuery, ScriptedSessionFactory};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::{
        ColumnItem, ColumnsCatalog, ColumnsProfile, Script, ScriptGroup, ScriptsCatalog,
        SerializationRules, Variant,
    };
    use crate::run::{ExportMode, GroupSelection, RunSelection, ScriptSelection, UserContext};

    /// A requester identity with reasonable defaults.
    pub fn user_context() -> UserContext {
        UserContext {
            login: "tester".to_string(),
            database_id: "db-test".to_string(),
            manager_id: "m1".to_string(),
            stream_id: "st1".to_string(),
        }
    }

    /// A catalog script with one SQL file per variant id.
    pub fn script(id: &str, lane: usize, variant_ids: &[&str]) -> Script {
        Script {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            execution_lane: lane,
            variants: variant_ids
                .iter()
                .map(|v| Variant {
                    id: v.to_string(),
                    sql_file: format!("{id}_{v}.sql"),
                })
                .collect(),
            columns_profile_id: None,
        }
    }

    /// A single-group catalog.
    pub fn scripts_catalog(group_id: &str, scripts: Vec<Script>) -> ScriptsCatalog {
        ScriptsCatalog {
            groups: vec![ScriptGroup {
                id: group_id.to_string(),
                display_name: group_id.to_uppercase(),
                scripts,
            }],
        }
    }

    /// A columns catalog with one profile mapping ids to quoted column names.
    pub fn columns_catalog(profile_id: &str, items: &[(&str, &str)]) -> ColumnsCatalog {
        ColumnsCatalog {
            profiles: vec![ColumnsProfile {
                id: profile_id.to_string(),
                items: items
                    .iter()
                    .map(|(id, expr)| ColumnItem {
                        id: id.to_string(),
                        label: id.to_uppercase(),
                        expression: expr.to_string(),
                    })
                    .collect(),
            }],
            serialization: SerializationRules::default(),
        }
    }

    /// A selection enabling every listed script of one group, in default
    /// column mode.
    pub fn selection(group_id: &str, script_ids: &[&str]) -> RunSelection {
        RunSelection {
            groups: vec![GroupSelection {
                group_id: group_id.to_string(),
                enabled: true,
                scripts: script_ids
                    .iter()
                    .map(|id| ScriptSelection {
                        script_id: id.to_string(),
                        enabled: true,
                        export_mode: ExportMode::DefaultColumns,
                        selected_column_item_ids: vec![],
                    })
                    .collect(),
            }],
        }
    }
}
