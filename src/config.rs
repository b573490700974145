use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Compiler configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Iteration cap for `repeat` when neither `times` nor `until` bounds the loop
    #[validate(range(
        min = 1,
        max = 10000,
        message = "Max repeat depth must be between 1 and 10000"
    ))]
    pub max_repeat_depth: u32,

    /// Emit free vertex/edge chains as MATCH fragments instead of table-valued calls
    pub enable_match_paths: bool,

    /// Default output column of composite constructs
    #[validate(custom(function = "validate_column_name"))]
    pub default_column: String,

    /// Output column carrying the traversal path when path tracking is active
    #[validate(custom(function = "validate_column_name"))]
    pub path_column: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_repeat_depth: 100,
            enable_match_paths: true,
            default_column: "_default".to_string(),
            path_column: "_path".to_string(),
        }
    }
}

fn validate_column_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("column name cannot be empty"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::new(
            "column name must contain only ASCII letters, digits and underscores",
        ));
    }
    Ok(())
}

impl CompilerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_repeat_depth: parse_env_var("GREMLIN_TRANSLATOR_MAX_REPEAT_DEPTH", "100")?,
            enable_match_paths: parse_env_var("GREMLIN_TRANSLATOR_ENABLE_MATCH_PATHS", "true")?,
            default_column: env::var("GREMLIN_TRANSLATOR_DEFAULT_COLUMN")
                .unwrap_or_else(|_| "_default".to_string()),
            path_column: env::var("GREMLIN_TRANSLATOR_PATH_COLUMN")
                .unwrap_or_else(|_| "_path".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides on top of `self` and validate the result
    pub fn with_cli_overrides(mut self, cli: CliConfig) -> Result<Self, ConfigError> {
        if let Some(depth) = cli.max_repeat_depth {
            self.max_repeat_depth = depth;
        }
        if cli.no_match_paths {
            self.enable_match_paths = false;
        }

        self.validate()?;
        Ok(self)
    }

    /// Create configuration from YAML file, defaults filling the fields it omits
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.merge(ConfigOverlay::from_yaml_file(path)?)?;
        Ok(config)
    }

    /// Apply the fields an overlay sets (file overrides environment) and validate
    pub fn merge(&mut self, overlay: ConfigOverlay) -> Result<(), ConfigError> {
        if let Some(depth) = overlay.max_repeat_depth {
            self.max_repeat_depth = depth;
        }
        if let Some(enabled) = overlay.enable_match_paths {
            self.enable_match_paths = enabled;
        }
        if let Some(column) = overlay.default_column {
            self.default_column = column;
        }
        if let Some(column) = overlay.path_column {
            self.path_column = column;
        }

        self.validate()?;
        Ok(())
    }
}

/// Settings read from a configuration file; absent keys leave the
/// underlying configuration untouched
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigOverlay {
    pub max_repeat_depth: Option<u32>,
    pub enable_match_paths: Option<bool>,
    pub default_column: Option<String>,
    pub path_column: Option<String>,
}

impl ConfigOverlay {
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        // an empty file is an empty overlay
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })
    }
}

/// CLI overrides (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub max_repeat_depth: Option<u32>,
    pub no_match_paths: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_repeat_depth, 100);
        assert!(config.enable_match_paths);
        assert_eq!(config.default_column, "_default");
    }

    #[test]
    fn test_invalid_repeat_depth() {
        let config = CompilerConfig {
            max_repeat_depth: 0, // Invalid
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CompilerConfig {
            max_repeat_depth: 10001, // Invalid (> 10000)
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_column_name() {
        let config = CompilerConfig {
            path_column: "my path".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_repeat_depth: 12\nenable_match_paths: false").unwrap();

        let config = CompilerConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.max_repeat_depth, 12);
        assert!(!config.enable_match_paths);
        // unspecified fields keep their defaults
        assert_eq!(config.path_column, "_path");
    }

    #[test]
    fn test_yaml_validation_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_repeat_depth: 0").unwrap();

        let result = CompilerConfig::from_yaml_file(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let config = CompilerConfig::default()
            .with_cli_overrides(CliConfig {
                max_repeat_depth: Some(7),
                no_match_paths: true,
            })
            .unwrap();
        assert_eq!(config.max_repeat_depth, 7);
        assert!(!config.enable_match_paths);
    }

    #[test]
    fn test_overlay_keeps_settings_it_omits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enable_match_paths: false").unwrap();

        let mut config = CompilerConfig {
            max_repeat_depth: 50,
            path_column: "trail".to_string(),
            ..Default::default()
        };
        config
            .merge(ConfigOverlay::from_yaml_file(file.path()).unwrap())
            .unwrap();
        assert_eq!(config.max_repeat_depth, 50);
        assert_eq!(config.path_column, "trail");
        assert!(!config.enable_match_paths);
    }

    #[test]
    fn test_overlay_validation_failure() {
        let mut config = CompilerConfig::default();
        let result = config.merge(ConfigOverlay {
            default_column: Some(String::new()),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
