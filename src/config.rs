//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Object name filters, applied identically to every category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Where the generated script goes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// `None` writes to stdout
    pub path: Option<PathBuf>,
}

/// Metadata fetch tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub workers: usize,
    pub max_attempts: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            max_attempts: 3,
        }
    }
}

pub const DEFAULT_ROUTINE_DELIMITER: &str = "$$";

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub filter: FilterConfig,
    pub output: OutputConfig,
    pub fetch: FetchConfig,
    pub routine_delimiter: String,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key/value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        let source = PathBuf::from(required("SOURCE_SNAPSHOT")?);
        let destination = PathBuf::from(required("DEST_SNAPSHOT")?);

        let filter = FilterConfig {
            include: lookup("INCLUDE_OBJECTS")
                .map(|s| Self::split_list(&s))
                .unwrap_or_default(),
            exclude: lookup("EXCLUDE_OBJECTS")
                .map(|s| Self::split_list(&s))
                .unwrap_or_default(),
        };

        let output = OutputConfig {
            path: lookup("OUTPUT_PATH")
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty() && p != "-")
                .map(PathBuf::from),
        };

        let defaults = FetchConfig::default();
        let fetch = FetchConfig {
            workers: Self::parse_positive("FETCH_WORKERS", lookup("FETCH_WORKERS"))?
                .unwrap_or(defaults.workers),
            max_attempts: Self::parse_positive("FETCH_ATTEMPTS", lookup("FETCH_ATTEMPTS"))?
                .map(|n| n as u32)
                .unwrap_or(defaults.max_attempts),
        };

        let routine_delimiter = match lookup("ROUTINE_DELIMITER") {
            Some(d) => {
                let d = d.trim().to_string();
                if d.is_empty() || d == ";" || d.contains(char::is_whitespace) {
                    return Err(ConfigError::InvalidValue(format!(
                        "ROUTINE_DELIMITER must be a non-blank token other than ';' (got {:?})",
                        d
                    )));
                }
                d
            }
            None => DEFAULT_ROUTINE_DELIMITER.to_string(),
        };

        Ok(Self {
            source,
            destination,
            filter,
            output,
            fetch,
            routine_delimiter,
        })
    }

    fn split_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn parse_positive(key: &str, raw: Option<String>) -> Result<Option<usize>, ConfigError> {
        match raw {
            None => Ok(None),
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok(Some(n)),
                _ => Err(ConfigError::InvalidValue(format!(
                    "{} must be a positive integer (got {:?})",
                    key, v
                ))),
            },
        }
    }
}
