//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::OrchestratorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[source] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<OrchestratorConfig, ConfigError> {
    let config: OrchestratorConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/orchestrator.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_config("network = ").unwrap_err();
        assert!(err.to_string().starts_with("Parse error"));
    }

    #[test]
    fn test_all_validation_errors_reported() {
        let err = parse_config(
            r#"
            [rpc]
            url = "nope"
            timeout_secs = 0
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {}", other),
        }
    }

    #[test]
    fn test_error_display_and_source() {
        let err = parse_config("[rpc]\ntimeout_secs = 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: rpc.timeout_secs: must be greater than 0"
        );
        assert!(std::error::Error::source(&err).is_none());

        let err = load_config(Path::new("/nonexistent/orchestrator.toml")).unwrap_err();
        assert!(err.to_string().starts_with("IO error: "));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }
}
