//! The shard manager facade.
//!
//! One [`ShardManager`] per process, constructed and owned explicitly so
//! tests can create isolated instances. It wires the registry and router
//! together and exposes the full runtime surface: setup, resolution,
//! iteration (see the iteration methods), and teardown.

use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::config::ShardsConfig;
use crate::context::TagContext;
use crate::driver::ShardDriver;
use crate::entity::Entity;
use crate::error::ShardError;
use crate::registry::{PoolHandle, ShardRegistry};
use crate::router::ConnectionRouter;
use crate::shard::{ConnectionSpec, Shard, ShardSpec};
use crate::tags::{Tag, TagSet};

/// Owns the shard registry and connection router for one process.
pub struct ShardManager<D: ShardDriver> {
    registry: Arc<ShardRegistry<D::Pool>>,
    router: ConnectionRouter<D>,
    /// Tags applied when resolving without a particular entity type.
    default_entity_tags: RwLock<TagSet>,
}

impl<D: ShardDriver> ShardManager<D> {
    pub fn new(driver: D) -> Self {
        let registry = Arc::new(ShardRegistry::new());
        let router = ConnectionRouter::new(Arc::clone(&registry), driver);
        Self {
            registry,
            router,
            default_entity_tags: RwLock::new(TagSet::new()),
        }
    }

    /// Register every spec, then connect every registered shard.
    ///
    /// # Errors
    /// Aborts on the first invalid specification or connection failure;
    /// configuration errors at setup are fatal rather than skipped.
    pub fn setup(&self, specs: impl IntoIterator<Item = ShardSpec>) -> Result<(), ShardError> {
        for spec in specs {
            self.registry.add(spec)?;
        }
        self.router.establish_all()?;
        tracing::info!(shards = self.registry.len(), "shard routing ready");
        Ok(())
    }

    /// Load a YAML shard configuration file and [`setup`](Self::setup) from it.
    pub fn setup_from_file(&self, path: impl AsRef<Path>) -> Result<(), ShardError> {
        let config = ShardsConfig::load(path)?;
        self.setup(config.into_shard_specs())
    }

    /// All registered shards, in insertion order.
    pub fn shards(&self) -> Vec<Arc<Shard>> {
        self.registry.shards()
    }

    /// Exact-name shard lookup.
    pub fn find_by_name(&self, name: &str) -> Result<Arc<Shard>, ShardError> {
        self.registry.find_by_name(name)
    }

    /// Resolve the pool for entity type `E` under the given context.
    pub fn resolve<E: Entity>(
        &self,
        ctx: &TagContext,
    ) -> Result<PoolHandle<D::Pool>, ShardError> {
        self.router.resolve_pool(ctx, &E::entity_tags())
    }

    /// Resolve the pool for an explicit entity tag set.
    pub fn resolve_pool(
        &self,
        ctx: &TagContext,
        entity_tags: &TagSet,
    ) -> Result<PoolHandle<D::Pool>, ShardError> {
        self.router.resolve_pool(ctx, entity_tags)
    }

    /// Resolve using the configured default entity tags, for operations not
    /// associated with any particular entity type.
    pub fn resolve_default(&self, ctx: &TagContext) -> Result<PoolHandle<D::Pool>, ShardError> {
        let defaults = self
            .default_entity_tags
            .read()
            .expect("lock poisoned")
            .clone();
        self.router.resolve_pool(ctx, &defaults)
    }

    /// Resolve entity type `E`'s unique connection, release it, and return
    /// its connection parameters.
    pub fn remove_connection<E: Entity>(
        &self,
        ctx: &TagContext,
    ) -> Result<ConnectionSpec, ShardError> {
        self.router.remove_connection(ctx, &E::entity_tags())
    }

    /// Tags used by [`resolve_default`](Self::resolve_default).
    pub fn default_entity_tags(&self) -> TagSet {
        self.default_entity_tags
            .read()
            .expect("lock poisoned")
            .clone()
    }

    pub fn set_default_entity_tags<I, T>(&self, tags: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        *self.default_entity_tags.write().expect("lock poisoned") = tags.into_iter().collect();
    }

    /// Disconnect every shard and reset the registry.
    ///
    /// The manager is reusable afterwards; a subsequent
    /// [`setup`](Self::setup) starts from a clean slate.
    pub fn stop(&self) -> Result<(), ShardError> {
        let result = self.router.disconnect_all();
        self.registry.clear();
        tracing::info!("shard routing stopped");
        result
    }

    pub fn registry(&self) -> &Arc<ShardRegistry<D::Pool>> {
        &self.registry
    }

    pub fn router(&self) -> &ConnectionRouter<D> {
        &self.router
    }
}

impl<D: ShardDriver> std::fmt::Debug for ShardManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardManager")
            .field("shards", &self.registry.len())
            .field("connected", &self.registry.connected_pools().len())
            .finish_non_exhaustive()
    }
}
