//! # Configuration File Parser
//!
//! Reads and parses `smartbi.toml`, the optional configuration file for the
//! service. Every section and every key has a default, so an empty or
//! missing file is a valid configuration.
//!
//! - `[server]`: bind address and environment name
//! - `[model]`: model name override and request timeout
//! - `[extraction]`: default/maximum sample size, PostgreSQL schema
//! - `[summary]`: character budget and rows shown per table
//! - `[upload]`: maximum upload size
//!
//! Example `smartbi.toml`:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! environment = "production"
//!
//! [model]
//! name = "gemini-2.5-flash-lite"
//! timeout_secs = 120
//!
//! [extraction]
//! sample_limit = 1000
//! max_sample_limit = 10000
//! postgres_schema = "public"
//!
//! [summary]
//! char_budget = 100000
//! rows_per_table = 50
//!
//! [upload]
//! max_bytes = 52428800
//! ```
//!
//! API keys are never read from this file; they come from the environment
//! (see [`crate::llm::client::HostedModel::from_env`]).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SmartBiError};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "smartbi.toml";

/// Default number of rows sampled per table.
pub const DEFAULT_SAMPLE_LIMIT: usize = 1000;

/// Default upload cap: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Top-level smartbi.toml structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmartBiConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub extraction: ExtractionConfig,
    pub summary: SummaryConfig,
    pub upload: UploadConfig,

    /// Path of the file this config was read from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// HTTP bind settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Free-form environment name ("development", "production", ...).
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: "development".to_string(),
        }
    }
}

/// Hosted model settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name override. `None` uses the provider's default.
    pub name: Option<String>,
    /// Request timeout for one model call.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: None,
            timeout_secs: 120,
        }
    }
}

/// Database extraction settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Rows sampled per table when the caller does not say.
    pub sample_limit: usize,
    /// Upper bound accepted from callers.
    pub max_sample_limit: usize,
    /// Schema enumerated on PostgreSQL.
    pub postgres_schema: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            max_sample_limit: 10_000,
            postgres_schema: "public".to_string(),
        }
    }
}

/// Prompt body sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub char_budget: usize,
    pub rows_per_table: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            char_budget: 100_000,
            rows_per_table: 50,
        }
    }
}

/// Upload settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Read and parse a smartbi.toml file from the given directory.
///
/// Returns `None` if the file doesn't exist (config is optional).
/// Returns an error if the file exists but can't be parsed.
pub fn read_config(dir: &Path) -> Result<Option<SmartBiConfig>> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    read_config_file(&path).map(Some)
}

/// Read and parse an explicit config file path. The file must exist.
pub fn read_config_file(path: &Path) -> Result<SmartBiConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SmartBiError::Config {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;

    let mut config: SmartBiConfig = toml::from_str(&content).map_err(|e| SmartBiError::Config {
        message: format!("Failed to parse {}: {}", path.display(), e),
    })?;
    config.source_path = Some(path.to_path_buf());

    config.validate()?;
    Ok(config)
}

impl SmartBiConfig {
    /// Apply `HOST`, `PORT`, `ENVIRONMENT` and `SMARTBI_MODEL` from the
    /// process environment on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| SmartBiError::Config {
                message: format!("PORT must be a number between 0 and 65535, got '{}'", port),
            })?;
        }
        if let Some(environment) = lookup("ENVIRONMENT") {
            self.server.environment = environment;
        }
        if let Some(model) = lookup("SMARTBI_MODEL") {
            self.model.name = Some(model);
        }
        self.validate()
    }

    /// Validate semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if self.extraction.sample_limit == 0 {
            return Err(SmartBiError::Config {
                message: "extraction.sample_limit must be at least 1".to_string(),
            });
        }
        if self.extraction.sample_limit > self.extraction.max_sample_limit {
            return Err(SmartBiError::Config {
                message: format!(
                    "extraction.sample_limit ({}) exceeds extraction.max_sample_limit ({})",
                    self.extraction.sample_limit, self.extraction.max_sample_limit
                ),
            });
        }
        if self.summary.char_budget < 1_000 {
            return Err(SmartBiError::Config {
                message: format!(
                    "summary.char_budget must be at least 1000 characters, got {}",
                    self.summary.char_budget
                ),
            });
        }
        if self.model.timeout_secs == 0 {
            return Err(SmartBiError::Config {
                message: "model.timeout_secs must be at least 1".to_string(),
            });
        }
        if self.upload.max_bytes == 0 {
            return Err(SmartBiError::Config {
                message: "upload.max_bytes must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
environment = "production"

[model]
name = "gemini-2.5-pro"
timeout_secs = 60

[extraction]
sample_limit = 250
max_sample_limit = 5000
postgres_schema = "sales"

[summary]
char_budget = 20000
rows_per_table = 10

[upload]
max_bytes = 1048576
"#;

        let config: SmartBiConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.environment, "production");
        assert_eq!(config.model.name.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(config.model.timeout_secs, 60);
        assert_eq!(config.extraction.sample_limit, 250);
        assert_eq!(config.extraction.max_sample_limit, 5000);
        assert_eq!(config.extraction.postgres_schema, "sales");
        assert_eq!(config.summary.char_budget, 20000);
        assert_eq!(config.summary.rows_per_table, 10);
        assert_eq!(config.upload.max_bytes, 1048576);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config: SmartBiConfig = toml::from_str("").unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.extraction.sample_limit, DEFAULT_SAMPLE_LIMIT);
        assert_eq!(config.extraction.postgres_schema, "public");
        assert_eq!(config.upload.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.model.name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml = r#"
[extraction]
sample_limit = 10
"#;
        let config: SmartBiConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.extraction.sample_limit, 10);
        assert_eq!(config.extraction.max_sample_limit, 10_000);
        assert_eq!(config.extraction.postgres_schema, "public");
    }

    #[test]
    fn test_read_config_nonexistent() {
        let result = read_config(Path::new("/nonexistent/dir"));
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_read_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
[server]
port = 8123
"#,
        )
        .unwrap();

        let config = read_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.server.port, 8123);
        assert_eq!(
            config.source_path.as_deref(),
            Some(dir.path().join(CONFIG_FILE_NAME).as_path())
        );
    }

    #[test]
    fn test_read_config_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "this is not valid [[[toml").unwrap();

        let result = read_config(dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_sample_limit() {
        let toml = r#"
[extraction]
sample_limit = 0
"#;
        let config: SmartBiConfig = toml::from_str(toml).unwrap();
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("sample_limit"), "unexpected message: {}", msg);
    }

    #[test]
    fn test_validate_rejects_limit_above_max() {
        let toml = r#"
[extraction]
sample_limit = 500
max_sample_limit = 100
"#;
        let config: SmartBiConfig = toml::from_str(toml).unwrap();
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("500"), "unexpected message: {}", msg);
        assert!(msg.contains("100"), "unexpected message: {}", msg);
    }

    #[test]
    fn test_validate_rejects_tiny_budget() {
        let toml = r#"
[summary]
char_budget = 10
"#;
        let config: SmartBiConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SmartBiConfig::default();
        config
            .apply_overrides(|key| match key {
                "HOST" => Some("127.0.0.1".to_string()),
                "PORT" => Some("9090".to_string()),
                "SMARTBI_MODEL" => Some("gemini-2.5-pro".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.model.name.as_deref(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn test_env_override_bad_port() {
        let mut config = SmartBiConfig::default();
        let result = config.apply_overrides(|key| match key {
            "PORT" => Some("eighty".to_string()),
            _ => None,
        });
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("eighty"), "unexpected message: {}", msg);
    }
}
