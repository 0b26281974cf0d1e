//! Crate-wide error types.
//!
//! The taxonomy follows the failure surfaces of the routing core:
//! configuration errors are fatal at setup, resolution errors are expected
//! per-operation conditions reported to the caller, and empty-tag arguments
//! are usage errors that fail immediately.

use thiserror::Error;

use crate::config::ConfigError;
use crate::driver::DriverError;
use crate::tags::TagSet;

/// Errors surfaced by the shard routing core.
#[derive(Debug, Error)]
pub enum ShardError {
    /// A shard specification failed validation during setup.
    #[error("invalid shard specification: {0}")]
    InvalidShardSpec(String),

    /// No shard is registered under the requested name.
    #[error("no shard named '{0}'")]
    ShardNotFound(String),

    /// Resolution found no connected shard matching the desired tags.
    #[error("found no connections matching tags {tags}")]
    NoMatchingConnections {
        /// The desired tag set that matched nothing.
        tags: TagSet,
    },

    /// Resolution found more than one connected shard matching the desired tags.
    #[error("found {count} connections matching tags {tags}")]
    TooManyMatchingConnections {
        /// How many connected shards matched.
        count: usize,
        /// The ambiguous desired tag set.
        tags: TagSet,
    },

    /// An operation that requires tags was called with an empty argument.
    #[error("no tags specified for {operation}")]
    EmptyTags {
        /// The offending operation.
        operation: &'static str,
    },

    /// The driver collaborator failed to open or release a pool.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Shard configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
