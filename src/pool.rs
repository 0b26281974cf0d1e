//! r2d2-backed connection pooling driver.
//!
//! [`PooledDriver`] is a ready-made [`ShardDriver`] for databases with an
//! r2d2 connection manager: it builds one `r2d2::Pool` per shard from a
//! caller-supplied [`ManagerFactory`]. The routing core stays ignorant of
//! the database protocol; the factory is the only piece that knows how to
//! turn a [`ConnectionSpec`] into a concrete manager.

use r2d2::ManageConnection;

use crate::driver::{DriverError, ShardDriver};
use crate::shard::ConnectionSpec;

/// Minimum connection pool size.
const MIN_POOL_SIZE: u32 = 2;

/// Maximum connection pool size.
const MAX_POOL_SIZE: u32 = 32;

/// Default pool size: available CPU parallelism, clamped to the bounds above.
fn default_pool_size() -> u32 {
    std::thread::available_parallelism()
        .map(|p| (p.get() as u32).clamp(MIN_POOL_SIZE, MAX_POOL_SIZE))
        .unwrap_or(4)
}

/// Builds an r2d2 connection manager for a shard's connection parameters.
pub trait ManagerFactory: Send + Sync + 'static {
    /// The r2d2 manager type for the target database.
    type Manager: ManageConnection;

    /// Construct a manager that connects to the shard described by `spec`.
    fn manager(&self, spec: &ConnectionSpec) -> Result<Self::Manager, DriverError>;
}

/// [`ShardDriver`] producing one `r2d2::Pool` per shard.
pub struct PooledDriver<F: ManagerFactory> {
    factory: F,
    pool_size: u32,
}

impl<F: ManagerFactory> PooledDriver<F> {
    /// Create a driver with the default pool size.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            pool_size: default_pool_size(),
        }
    }

    /// Set the per-shard pool size.
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }
}

impl<F: ManagerFactory> ShardDriver for PooledDriver<F> {
    type Pool = r2d2::Pool<F::Manager>;

    fn connect(&self, spec: &ConnectionSpec) -> Result<Self::Pool, DriverError> {
        let manager = self.factory.manager(spec)?;
        let mut builder = r2d2::Pool::builder().max_size(self.pool_size);
        if let Some(timeout) = spec.connect_timeout {
            builder = builder.connection_timeout(timeout);
        }
        builder
            .build(manager)
            .map_err(|e| DriverError::new(e.to_string()))
    }

    fn disconnect(&self, _pool: &Self::Pool) -> Result<(), DriverError> {
        // r2d2 closes its connections when the last pool handle drops; the
        // registry releasing its handle is the disconnect.
        Ok(())
    }
}
