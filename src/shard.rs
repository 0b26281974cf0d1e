//! Shard entities and their connection specifications.
//!
//! A [`Shard`] is one physical database target: an immutable set of tags plus
//! the parameters a driver needs to reach it. Shards are created from a
//! [`ShardSpec`] during setup and live for the lifetime of the process; the
//! connection pool association is tracked by the registry, not the shard
//! itself.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::tags::TagSet;

/// Database adapter identifier, passed through to the driver collaborator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Adapter {
    /// MySQL-compatible server.
    Mysql,
    /// PostgreSQL server.
    Postgres,
    /// SQLite database file.
    Sqlite,
}

/// Connection parameters for one shard.
///
/// Opaque to the routing core beyond being handed to the driver; the core
/// never opens connections itself.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub adapter: Adapter,
    pub database: String,
    /// Optional per-connection timeout, forwarded to the driver.
    pub connect_timeout: Option<Duration>,
}

impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("adapter", &self.adapter)
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Validated input for registering a shard.
#[derive(Debug, Clone)]
pub struct ShardSpec {
    /// Explicit shard name; derived from the connection parameters and tags
    /// when absent.
    pub name: Option<String>,
    /// Tags selecting this shard during resolution. Must be non-empty.
    pub tags: TagSet,
    /// How the driver reaches the shard.
    pub connection: ConnectionSpec,
}

impl ShardSpec {
    pub fn new(tags: TagSet, connection: ConnectionSpec) -> Self {
        Self {
            name: None,
            tags,
            connection,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name used in validation error messages when no explicit name exists.
    pub(crate) fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}:{}", self.connection.host, self.connection.database),
        }
    }

    /// Deterministic name derived from connection parameters and sorted tags.
    pub(crate) fn derived_name(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.connection.host,
            self.connection.database,
            self.connection.username,
            self.tags.join(",")
        )
    }
}

/// One physical database target with immutable tags and connection parameters.
#[derive(Debug)]
pub struct Shard {
    name: String,
    tags: TagSet,
    connection: ConnectionSpec,
}

impl Shard {
    pub(crate) fn new(name: String, tags: TagSet, connection: ConnectionSpec) -> Self {
        Self {
            name,
            tags,
            connection,
        }
    }

    /// Unique name across the registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shard's static tags.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Connection parameters handed to the driver.
    pub fn connection(&self) -> &ConnectionSpec {
        &self.connection
    }

    /// Whether this shard's tags are a superset of `desired`.
    pub fn matches(&self, desired: &TagSet) -> bool {
        desired.is_subset(&self.tags)
    }
}
