//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::InterceptorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<InterceptorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: InterceptorConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_loads_valid_file() {
        let path = write_temp("valid.toml", "[listener]\nbind_address = \"127.0.0.1:7000\"\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:7000");
        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_reports_parse_errors() {
        let path = write_temp("broken.toml", "[listener\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_reports_validation_errors() {
        let path = write_temp("invalid.toml", "[timeouts]\nrequest_secs = 0\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(err.to_string().contains("timeouts.request_secs"));
        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
