//! Connection routing and resolution.
//!
//! The [`ConnectionRouter`] combines a [`TagContext`] with an entity type's
//! static tags to compute the desired tag set, asks the registry for
//! connected matches, and enforces the exactly-one invariant: zero matches
//! and ambiguous matches both fail loudly. It also owns pool lifecycle —
//! establishing pools through the driver at startup and releasing them on
//! removal.

use std::sync::Arc;

use crate::context::TagContext;
use crate::driver::ShardDriver;
use crate::error::ShardError;
use crate::registry::{PoolHandle, ShardRegistry};
use crate::shard::{ConnectionSpec, Shard};
use crate::tags::TagSet;

/// Routes operations to the unique connected shard matching the active tags.
pub struct ConnectionRouter<D: ShardDriver> {
    registry: Arc<ShardRegistry<D::Pool>>,
    driver: D,
}

impl<D: ShardDriver> ConnectionRouter<D> {
    pub fn new(registry: Arc<ShardRegistry<D::Pool>>, driver: D) -> Self {
        Self { registry, driver }
    }

    /// The tag set an operation must match: the context's active tags,
    /// combined with `entity_tags` unless the current scope disables them.
    pub fn desired_tags(&self, ctx: &TagContext, entity_tags: &TagSet) -> TagSet {
        if ctx.entity_tags_disabled() {
            ctx.current_tags().clone()
        } else {
            ctx.current_tags().union(entity_tags)
        }
    }

    /// Resolve to the unique connected shard and its pool.
    ///
    /// # Errors
    /// [`ShardError::NoMatchingConnections`] when nothing matches,
    /// [`ShardError::TooManyMatchingConnections`] when the desired tags are
    /// ambiguous. Both are deterministic for a given tag configuration.
    pub fn resolve(
        &self,
        ctx: &TagContext,
        entity_tags: &TagSet,
    ) -> Result<(Arc<Shard>, PoolHandle<D::Pool>), ShardError> {
        let desired = self.desired_tags(ctx, entity_tags);
        let mut matches = self.registry.matching_connected(&desired);
        match matches.len() {
            0 => Err(ShardError::NoMatchingConnections { tags: desired }),
            1 => Ok(matches.remove(0)),
            count => Err(ShardError::TooManyMatchingConnections {
                count,
                tags: desired,
            }),
        }
    }

    /// Resolve to the unique matching pool.
    pub fn resolve_pool(
        &self,
        ctx: &TagContext,
        entity_tags: &TagSet,
    ) -> Result<PoolHandle<D::Pool>, ShardError> {
        self.resolve(ctx, entity_tags).map(|(_, handle)| handle)
    }

    /// Open a pool for `shard` if it does not already hold one.
    ///
    /// Idempotent: an already-connected shard returns its existing pool
    /// untouched. If a concurrent call wins the attach race, the extra pool
    /// is released and the winner's handle returned.
    pub fn establish(&self, shard: &Arc<Shard>) -> Result<PoolHandle<D::Pool>, ShardError> {
        if let Some(handle) = self.registry.pool_for(shard) {
            return Ok(handle);
        }

        let pool = self.driver.connect(shard.connection())?;
        match self.registry.try_attach(pool, shard) {
            Ok(handle) => {
                tracing::info!(shard = %shard.name(), pool = %handle.id(), "shard connection established");
                Ok(handle)
            }
            Err((extra, existing)) => {
                if let Err(error) = self.driver.disconnect(&extra) {
                    tracing::warn!(shard = %shard.name(), %error, "failed to release redundant pool");
                }
                Ok(existing)
            }
        }
    }

    /// Establish a pool for every registered shard.
    pub fn establish_all(&self) -> Result<(), ShardError> {
        for shard in self.registry.shards() {
            self.establish(&shard)?;
        }
        Ok(())
    }

    /// Resolve exactly one pool, detach it, and have the driver release it.
    /// Returns the released shard's connection parameters for diagnostics.
    pub fn remove_connection(
        &self,
        ctx: &TagContext,
        entity_tags: &TagSet,
    ) -> Result<ConnectionSpec, ShardError> {
        let (shard, handle) = self.resolve(ctx, entity_tags)?;
        self.registry.detach_pool(handle.id());
        self.driver.disconnect(handle.pool())?;
        tracing::info!(shard = %shard.name(), "shard connection removed");
        Ok(shard.connection().clone())
    }

    /// Detach and release every attached pool.
    ///
    /// Keeps going past individual driver failures so teardown releases as
    /// much as possible; the first failure is reported after the sweep.
    pub fn disconnect_all(&self) -> Result<(), ShardError> {
        let mut first_error = None;
        for (shard, handle) in self.registry.matching_connected(&TagSet::new()) {
            self.registry.detach_pool(handle.id());
            match self.driver.disconnect(handle.pool()) {
                Ok(()) => {
                    tracing::debug!(shard = %shard.name(), "shard connection closed");
                }
                Err(error) => {
                    tracing::warn!(shard = %shard.name(), %error, "failed to disconnect shard pool");
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    pub fn registry(&self) -> &Arc<ShardRegistry<D::Pool>> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubDriver, spec};

    fn router() -> ConnectionRouter<StubDriver> {
        ConnectionRouter::new(Arc::new(ShardRegistry::new()), StubDriver::new())
    }

    fn tags(labels: &[&str]) -> TagSet {
        labels.iter().copied().collect()
    }

    #[test]
    fn test_desired_tags_unions_entity_tags() {
        let router = router();
        let mut ctx = TagContext::new();
        ctx.add_tags(["foo"]).unwrap();

        let desired = router.desired_tags(&ctx, &tags(&["feline"]));
        assert_eq!(desired, tags(&["feline", "foo"]));
    }

    #[test]
    fn test_desired_tags_ignores_entity_tags_when_forced() {
        let router = router();
        let mut ctx = TagContext::new();
        let scope = ctx.force_tags(["honk"]);

        let desired = router.desired_tags(&scope, &tags(&["feline"]));
        assert_eq!(desired, tags(&["honk"]));
    }

    #[test]
    fn test_resolve_finds_unique_connected_shard() {
        let router = router();
        let foo = router.registry().add(spec("foo_db", &["foo"])).unwrap();
        router.registry().add(spec("bar_db", &["bar"])).unwrap();
        router.establish_all().unwrap();

        let mut ctx = TagContext::new();
        let scope = ctx.use_tags(["foo"]).unwrap();
        let (shard, handle) = router.resolve(&scope, &TagSet::new()).unwrap();
        assert_eq!(shard.name(), foo.name());
        assert_eq!(handle.pool().database, "foo_db");
    }

    #[test]
    fn test_resolve_fails_with_no_matches() {
        let router = router();
        router.registry().add(spec("foo_db", &["foo"])).unwrap();
        router.establish_all().unwrap();

        let mut ctx = TagContext::new();
        let scope = ctx.use_tags(["honk"]).unwrap();
        let err = router.resolve_pool(&scope, &TagSet::new()).unwrap_err();
        assert!(matches!(err, ShardError::NoMatchingConnections { .. }));
        assert_eq!(err.to_string(), "found no connections matching tags [honk]");
    }

    #[test]
    fn test_resolve_fails_with_ambiguous_matches() {
        let router = router();
        router
            .registry()
            .add(spec("foo_db", &["foo", "feline"]))
            .unwrap();
        router
            .registry()
            .add(spec("bar_db", &["bar", "feline"]))
            .unwrap();
        router.establish_all().unwrap();

        let mut ctx = TagContext::new();
        let scope = ctx.use_tags(["feline"]).unwrap();
        let err = router.resolve_pool(&scope, &TagSet::new()).unwrap_err();
        assert!(matches!(
            err,
            ShardError::TooManyMatchingConnections { count: 2, .. }
        ));
    }

    #[test]
    fn test_resolve_ignores_disconnected_shards() {
        let router = router();
        router.registry().add(spec("foo_db", &["foo"])).unwrap();

        let mut ctx = TagContext::new();
        let scope = ctx.use_tags(["foo"]).unwrap();
        let err = router.resolve_pool(&scope, &TagSet::new()).unwrap_err();
        assert!(matches!(err, ShardError::NoMatchingConnections { .. }));
    }

    #[test]
    fn test_establish_is_idempotent() {
        let router = router();
        let shard = router.registry().add(spec("foo_db", &["foo"])).unwrap();

        let first = router.establish(&shard).unwrap();
        let second = router.establish(&shard).unwrap();
        assert_eq!(first.id(), second.id());

        assert_eq!(router.driver.connect_count(), 1);
    }

    #[test]
    fn test_establish_propagates_driver_failure() {
        let router = router();
        let shard = router.registry().add(spec("foo_db", &["foo"])).unwrap();
        router.driver.fail_connects_to("foo_db");

        let err = router.establish(&shard).unwrap_err();
        assert!(matches!(err, ShardError::Driver(_)));
        assert!(router.registry().pool_for(&shard).is_none());
    }

    #[test]
    fn test_remove_connection_detaches_and_releases() {
        let router = router();
        router.registry().add(spec("foo_db", &["foo"])).unwrap();
        router.registry().add(spec("bar_db", &["bar"])).unwrap();
        router.establish_all().unwrap();

        let mut ctx = TagContext::new();
        let scope = ctx.use_tags(["foo"]).unwrap();
        let released = router.remove_connection(&scope, &TagSet::new()).unwrap();
        assert_eq!(released.database, "foo_db");

        assert_eq!(router.registry().connected_pools().len(), 1);
        assert_eq!(router.driver.disconnect_count(), 1);

        // The removed shard no longer resolves.
        let err = router.resolve_pool(&scope, &TagSet::new()).unwrap_err();
        assert!(matches!(err, ShardError::NoMatchingConnections { .. }));
    }

    #[test]
    fn test_disconnect_all_sweeps_every_pool() {
        let router = router();
        router.registry().add(spec("foo_db", &["foo"])).unwrap();
        router.registry().add(spec("bar_db", &["bar"])).unwrap();
        router.establish_all().unwrap();

        router.disconnect_all().unwrap();
        assert!(router.registry().connected_pools().is_empty());
        assert_eq!(router.driver.disconnect_count(), 2);
    }
}
