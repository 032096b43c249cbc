use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::export::CleanupPolicy;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub datasource: DatasourceConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Export output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Root directory all run output is written under.
    #[serde(default = "default_output_root")]
    pub root_path: PathBuf,
    /// Directory containing the SQL script files referenced by the catalog.
    #[serde(default = "default_scripts_root")]
    pub scripts_root: PathBuf,
    /// Text encoding label for output files (resolved via encoding_rs).
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Maximum bytes per output part file.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// When to delete the previous run's output directory.
    #[serde(default)]
    pub cleanup_policy: CleanupPolicy,
    /// Whether a single line is allowed to exceed the per-file budget.
    #[serde(default = "default_true")]
    pub allow_oversize_single_line: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_path: default_output_root(),
            scripts_root: default_scripts_root(),
            encoding: default_encoding(),
            max_file_bytes: default_max_file_bytes(),
            cleanup_policy: CleanupPolicy::default(),
            allow_oversize_single_line: true,
        }
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}

fn default_scripts_root() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_max_file_bytes() -> u64 {
    16 * 1024 * 1024 // 16 MiB
}

fn default_true() -> bool {
    true
}

/// Run execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Number of concurrent lanes. Scripts declare which lane they run in;
    /// lanes outside 0..lane_count are never drained.
    #[serde(default = "default_lane_count")]
    pub lane_count: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            lane_count: default_lane_count(),
        }
    }
}

fn default_lane_count() -> usize {
    4
}

/// Locations of the JSON catalog files.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_scripts_path")]
    pub scripts_path: PathBuf,
    #[serde(default = "default_columns_path")]
    pub columns_path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            scripts_path: default_scripts_path(),
            columns_path: default_columns_path(),
        }
    }
}

fn default_scripts_path() -> PathBuf {
    PathBuf::from("config/scripts.json")
}

fn default_columns_path() -> PathBuf {
    PathBuf::from("config/columns.json")
}

/// Data source configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatasourceConfig {
    /// Data source backend type.
    #[serde(default)]
    pub backend: DatasourceBackend,
    /// Mock backend configuration.
    #[serde(default)]
    pub mock: MockDatasourceConfig,
}

/// Available data source backends.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatasourceBackend {
    #[default]
    Mock,
    // Future: Db2 via an ODBC bridge
}

/// Mock data source backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockDatasourceConfig {
    /// Number of rows every query yields.
    #[serde(default = "default_rows_per_query")]
    pub rows_per_query: usize,
}

impl Default for MockDatasourceConfig {
    fn default() -> Self {
        Self {
            rows_per_query: default_rows_per_query(),
        }
    }
}

fn default_rows_per_query() -> usize {
    5
}

/// Sanitized config for API responses (local paths and backend details
/// redacted).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub execution: ExecutionConfig,
    pub output: SanitizedOutputConfig,
    pub datasource: SanitizedDatasourceConfig,
}

/// Sanitized output config (filesystem paths hidden).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOutputConfig {
    pub encoding: String,
    pub max_file_bytes: u64,
    pub cleanup_policy: CleanupPolicy,
    pub allow_oversize_single_line: bool,
}

/// Sanitized data source config (connection details hidden).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDatasourceConfig {
    pub backend: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            execution: config.execution.clone(),
            output: SanitizedOutputConfig {
                encoding: config.output.encoding.clone(),
                max_file_bytes: config.output.max_file_bytes,
                cleanup_policy: config.output.cleanup_policy,
                allow_oversize_single_line: config.output.allow_oversize_single_line,
            },
            datasource: SanitizedDatasourceConfig {
                backend: match config.datasource.backend {
                    DatasourceBackend::Mock => "mock".to_string(),
                },
            },
        }
    }
}
