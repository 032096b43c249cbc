use serde::{Deserialize, Serialize};

/// The script catalog: groups of scripts, each script a set of SQL variants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptsCatalog {
    pub groups: Vec<ScriptGroup>,
}

impl ScriptsCatalog {
    pub fn group(&self, group_id: &str) -> Option<&ScriptGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptGroup {
    pub id: String,
    pub display_name: String,
    pub scripts: Vec<Script>,
}

impl ScriptGroup {
    pub fn script(&self, script_id: &str) -> Option<&Script> {
        self.scripts.iter().find(|s| s.id == script_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub display_name: String,
    /// The concurrency lane this script's variants execute in. Declared
    /// statically so scripts sharing a lane-scoped resource never overlap.
    pub execution_lane: usize,
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub columns_profile_id: Option<String>,
}

/// One SQL formulation of a script, referencing its source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub sql_file: String,
}

/// The columns catalog: named profiles of selectable column expressions plus
/// the serialization rules used when projecting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsCatalog {
    pub profiles: Vec<ColumnsProfile>,
    pub serialization: SerializationRules,
}

impl ColumnsCatalog {
    pub fn profile(&self, profile_id: &str) -> Option<&ColumnsProfile> {
        self.profiles.iter().find(|p| p.id == profile_id)
    }
}

impl Default for ColumnsCatalog {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            serialization: SerializationRules::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsProfile {
    pub id: String,
    pub items: Vec<ColumnItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnItem {
    pub id: String,
    pub label: String,
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializationRules {
    pub delimiter: String,
    pub escape: EscapeStrings,
}

impl Default for SerializationRules {
    fn default() -> Self {
        Self {
            delimiter: "|".to_string(),
            escape: EscapeStrings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscapeStrings {
    pub backslash: String,
    pub pipe: String,
    pub cr: String,
    pub lf: String,
}

impl Default for EscapeStrings {
    fn default() -> Self {
        Self {
            backslash: r"\\".to_string(),
            pipe: r"\|".to_string(),
            cr: r"\\r".to_string(),
            lf: r"\\n".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_catalog_deserializes_camel_case() {
        let json = r#"{
            "groups": [
                {
                    "id": "g1",
                    "displayName": "Group One",
                    "scripts": [
                        {
                            "id": "s1",
                            "displayName": "Script One",
                            "executionLane": 2,
                            "variants": [
                                { "id": "v1", "sqlFile": "s1_v1.sql" },
                                { "id": "v2", "sqlFile": "s1_v2.sql" }
                            ],
                            "columnsProfileId": "p1"
                        }
                    ]
                }
            ]
        }"#;
        let catalog: ScriptsCatalog = serde_json::from_str(json).unwrap();
        let script = catalog.group("g1").unwrap().script("s1").unwrap();
        assert_eq!(script.execution_lane, 2);
        assert_eq!(script.variants.len(), 2);
        assert_eq!(script.columns_profile_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_script_without_profile() {
        let json = r#"{
            "id": "s1",
            "displayName": "Script One",
            "executionLane": 0,
            "variants": []
        }"#;
        let script: Script = serde_json::from_str(json).unwrap();
        assert!(script.columns_profile_id.is_none());
    }

    #[test]
    fn test_columns_catalog_lookup() {
        let json = r#"{
            "profiles": [
                {
                    "id": "p1",
                    "items": [
                        { "id": "c1", "label": "Name", "expression": "\"NAME\"" }
                    ]
                }
            ],
            "serialization": {
                "delimiter": "|",
                "escape": { "backslash": "\\\\", "pipe": "\\|", "cr": "\\\\r", "lf": "\\\\n" }
            }
        }"#;
        let catalog: ColumnsCatalog = serde_json::from_str(json).unwrap();
        assert!(catalog.profile("p1").is_some());
        assert!(catalog.profile("p2").is_none());
        assert_eq!(catalog.serialization.delimiter, "|");
    }

    #[test]
    fn test_unknown_group_lookup_is_none() {
        let catalog = ScriptsCatalog::default();
        assert!(catalog.group("nope").is_none());
    }
}
