//! Shard configuration loading.
//!
//! Provides YAML-based configuration loading and validation for the shard
//! topology: one entry per shard with its tags and connection parameters.
//! Credentials may reference environment variables with `${VAR}` /
//! `${VAR:-default}` syntax, expanded before parsing.

mod shards;
mod validation;

pub use shards::{ShardConfig, ShardsConfig};
pub use validation::{ConfigError, expand_env_vars};
