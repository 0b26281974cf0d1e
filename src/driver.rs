//! The driver collaborator seam.
//!
//! The routing core never opens database connections. A [`ShardDriver`]
//! supplies an opaque pool per shard and releases it again; everything the
//! core knows about a pool is which shard it belongs to.

use thiserror::Error;

use crate::shard::ConnectionSpec;

/// Failure reported by a driver while opening or releasing a pool.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DriverError(String);

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Opens and releases connection pools for shards.
///
/// The associated `Pool` type is fully opaque to the core: any cloneable
/// handle works. Keeping `disconnect` on the driver (rather than on the pool)
/// means implementations need no pool-side trait at all.
pub trait ShardDriver: Send + Sync + 'static {
    /// Cloneable handle to a live connection pool.
    type Pool: Clone + Send + Sync + 'static;

    /// Open a pool for the given connection parameters.
    fn connect(&self, spec: &ConnectionSpec) -> Result<Self::Pool, DriverError>;

    /// Release a pool's resources.
    fn disconnect(&self, pool: &Self::Pool) -> Result<(), DriverError>;
}
