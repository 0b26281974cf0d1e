//! Tagshard - Tag-Based Shard Routing
//!
//! This crate routes database operations issued by an application's
//! data-access layer to one of several independently-addressable database
//! shards, selecting the target dynamically by tag matching instead of
//! static per-call-site configuration.
//!
//! # Architecture
//!
//! - **Registry**: the process-wide set of configured shards and their live
//!   pool associations
//! - **Tag context**: a per-execution-unit scoping stack of active tags,
//!   restored on every exit path
//! - **Router**: resolves the unique connected shard for an operation and
//!   manages pool lifecycle through a pluggable driver
//! - **Iteration**: run an operation once per tag or once per connected
//!   shard, strictly sequentially
//! - **Migrations**: apply schema changes on their tag-matched shards
//!
//! # Example
//!
//! ```rust,ignore
//! use tagshard::{Entity, ShardManager, TagContext, TagSet};
//!
//! struct Invoice;
//!
//! impl Entity for Invoice {
//!     fn entity_tags() -> TagSet {
//!         ["billing"].into_iter().collect()
//!     }
//! }
//!
//! fn main() -> Result<(), tagshard::ShardError> {
//!     let manager = ShardManager::new(driver);
//!     manager.setup_from_file("configs/shards.yaml")?;
//!
//!     let mut ctx = TagContext::new();
//!     {
//!         let scope = ctx.use_tags(["europe"])?;
//!         let pool = manager.resolve::<Invoice>(&scope)?;
//!         // ... run queries against the pool for the europe billing shard
//!     }
//!
//!     manager.stop()
//! }
//! ```

pub mod config;
pub mod context;
pub mod driver;
pub mod entity;
pub mod error;
mod iter;
pub mod manager;
pub mod migrate;
pub mod pool;
pub mod registry;
pub mod router;
pub mod shard;
pub mod tags;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, ShardsConfig};
pub use context::{TagContext, TagScope};
pub use driver::{DriverError, ShardDriver};
pub use entity::Entity;
pub use error::ShardError;
pub use manager::ShardManager;
pub use migrate::{Migration, MigrationDirection, ShardMigrator};
pub use pool::{ManagerFactory, PooledDriver};
pub use registry::{PoolHandle, PoolId, ShardRegistry};
pub use router::ConnectionRouter;
pub use shard::{Adapter, ConnectionSpec, Shard, ShardSpec};
pub use tags::{Tag, TagSet};
