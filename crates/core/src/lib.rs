pub mod catalog;
pub mod config;
pub mod datasource;
pub mod events;
pub mod export;
pub mod metrics;
pub mod run;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use run::{Run, RunEngine, RunSelection, Status, UserContext};
