use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one execution lane
/// - Per-file byte budget is positive
/// - Output encoding label is a known encoding
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Execution validation
    if config.execution.lane_count == 0 {
        return Err(ConfigError::ValidationError(
            "execution.lane_count must be at least 1".to_string(),
        ));
    }

    // Output validation
    if config.output.max_file_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "output.max_file_bytes must be at least 1".to_string(),
        ));
    }
    if encoding_rs::Encoding::for_label(config.output.encoding.as_bytes()).is_none() {
        return Err(ConfigError::ValidationError(format!(
            "output.encoding is not a known encoding label: {}",
            config.output.encoding
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionConfig, OutputConfig, ServerConfig};
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_lanes_fails() {
        let config = Config {
            execution: ExecutionConfig { lane_count: 0 },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_file_budget_fails() {
        let config = Config {
            output: OutputConfig {
                max_file_bytes: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_unknown_encoding_fails() {
        let config = Config {
            output: OutputConfig {
                encoding: "klingon-8".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_windows_1252_is_known() {
        let config = Config {
            output: OutputConfig {
                encoding: "windows-1252".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }
}
