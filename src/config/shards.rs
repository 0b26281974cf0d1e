//! Shard topology configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shard::{Adapter, ConnectionSpec, ShardSpec};

use super::validation::{ConfigError, expand_env_vars};

/// One shard entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Explicit shard name (optional; derived when absent).
    #[serde(default)]
    pub name: Option<String>,

    /// Database server host.
    pub host: String,

    /// Database server port.
    pub port: u16,

    /// Connection username.
    pub username: String,

    /// Connection password (default: empty). May use `${VAR}` expansion.
    #[serde(default)]
    pub password: String,

    /// Database adapter identifier.
    pub adapter: Adapter,

    /// Database name on the server.
    pub database: String,

    /// Tags selecting this shard during resolution.
    pub tags: Vec<String>,

    /// Optional connection timeout (e.g. "5s", "500ms").
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
}

impl ShardConfig {
    fn display_name(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            _ => &self.database,
        }
    }

    fn into_shard_spec(self) -> ShardSpec {
        let spec = ShardSpec::new(
            self.tags.iter().collect(),
            ConnectionSpec {
                host: self.host,
                port: self.port,
                username: self.username,
                password: self.password,
                adapter: self.adapter,
                database: self.database,
                connect_timeout: self.connect_timeout,
            },
        );
        match self.name {
            Some(name) if !name.is_empty() => spec.with_name(name),
            _ => spec,
        }
    }
}

/// Top-level shard topology configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardsConfig {
    /// The configured shards, in file order.
    pub shards: Vec<ShardConfig>,
}

impl ShardsConfig {
    /// Load configuration from a YAML file.
    ///
    /// Environment variable references are expanded before parsing, so
    /// credentials need not be stored in the file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards.is_empty() {
            return Err(ConfigError::Validation(
                "no shards configured".to_string(),
            ));
        }

        for shard in &self.shards {
            let name = shard.display_name();

            if shard.host.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "shard '{name}': host must not be empty"
                )));
            }
            if shard.port == 0 {
                return Err(ConfigError::Validation(format!(
                    "shard '{name}': port must be non-zero"
                )));
            }
            if shard.database.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "shard '{name}': database must not be empty"
                )));
            }
            if shard.tags.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "shard '{name}': at least one tag is required"
                )));
            }
            if shard.tags.iter().any(|tag| tag.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "shard '{name}': tags must not be blank"
                )));
            }
        }

        Ok(())
    }

    /// Convert the entries into registry-ready shard specifications.
    pub fn into_shard_specs(self) -> Vec<ShardSpec> {
        self.shards
            .into_iter()
            .map(ShardConfig::into_shard_spec)
            .collect()
    }
}
