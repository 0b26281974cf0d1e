//! The process-wide shard registry.
//!
//! Owns every configured [`Shard`] plus the association between live
//! connection pools and their shards. Shards are kept in insertion order;
//! `matching_*` lookups preserve that order so iteration primitives visit
//! shards deterministically.
//!
//! The registry is shared by all execution units: mutations (`add`,
//! `attach_pool`, `detach_pool`, `clear`) serialize on a write lock, lookups
//! run concurrently on read locks.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::ShardError;
use crate::shard::{Shard, ShardSpec};
use crate::tags::TagSet;

/// Registry-assigned identity of an attached pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool-{}", self.0)
    }
}

/// A live pool together with its registry identity.
#[derive(Debug, Clone)]
pub struct PoolHandle<P> {
    id: PoolId,
    pool: P,
}

impl<P> PoolHandle<P> {
    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }
}

struct Inner<P> {
    shards: Vec<Arc<Shard>>,
    /// Shard name → attached pool. Present ⇔ the shard is connected.
    pools: HashMap<String, PoolHandle<P>>,
    /// Pool identity → owning shard.
    shard_for_pool: HashMap<PoolId, Arc<Shard>>,
}

impl<P> Inner<P> {
    fn is_connected(&self, shard: &Shard) -> bool {
        self.pools.contains_key(shard.name())
    }
}

/// Ordered collection of shards and their pool associations.
pub struct ShardRegistry<P> {
    inner: RwLock<Inner<P>>,
    next_pool_id: AtomicU64,
}

impl<P> Default for ShardRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ShardRegistry<P> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                shards: Vec::new(),
                pools: HashMap::new(),
                shard_for_pool: HashMap::new(),
            }),
            next_pool_id: AtomicU64::new(0),
        }
    }
}

impl<P: Clone> ShardRegistry<P> {
    /// Register a new, disconnected shard from `spec`.
    ///
    /// Derives a deterministic name from the connection parameters and
    /// sorted tags when the spec carries none.
    ///
    /// # Errors
    /// [`ShardError::InvalidShardSpec`] when the spec has no tags, a blank
    /// tag, or a name that collides with an already-registered shard.
    pub fn add(&self, spec: ShardSpec) -> Result<Arc<Shard>, ShardError> {
        if spec.tags.is_empty() {
            return Err(ShardError::InvalidShardSpec(format!(
                "no tags for '{}' shard",
                spec.display_name()
            )));
        }
        if spec.tags.iter().any(|tag| tag.is_empty()) {
            return Err(ShardError::InvalidShardSpec(format!(
                "blank tag for '{}' shard",
                spec.display_name()
            )));
        }

        let name = match &spec.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => spec.derived_name(),
        };

        let mut inner = self.inner.write().expect("lock poisoned");
        if inner.shards.iter().any(|shard| shard.name() == name) {
            return Err(ShardError::InvalidShardSpec(format!(
                "non-unique shard name: '{name}'"
            )));
        }

        let shard = Arc::new(Shard::new(name, spec.tags, spec.connection));
        inner.shards.push(Arc::clone(&shard));
        tracing::debug!(shard = %shard.name(), tags = %shard.tags(), "shard registered");
        Ok(shard)
    }

    /// All registered shards, in insertion order.
    pub fn shards(&self) -> Vec<Arc<Shard>> {
        self.inner.read().expect("lock poisoned").shards.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact-name lookup.
    ///
    /// # Errors
    /// [`ShardError::ShardNotFound`] when no shard carries `name`.
    pub fn find_by_name(&self, name: &str) -> Result<Arc<Shard>, ShardError> {
        self.inner
            .read()
            .expect("lock poisoned")
            .shards
            .iter()
            .find(|shard| shard.name() == name)
            .cloned()
            .ok_or_else(|| ShardError::ShardNotFound(name.to_string()))
    }

    /// Shards (connected or not) whose tags are a superset of `desired`,
    /// in insertion order. An empty `desired` matches every shard.
    pub fn matching_shards(&self, desired: &TagSet) -> Vec<Arc<Shard>> {
        self.inner
            .read()
            .expect("lock poisoned")
            .shards
            .iter()
            .filter(|shard| shard.matches(desired))
            .cloned()
            .collect()
    }

    /// Same filter as [`matching_shards`](Self::matching_shards), restricted
    /// to shards currently holding a pool.
    pub fn matching_connected_shards(&self, desired: &TagSet) -> Vec<Arc<Shard>> {
        self.matching_connected(desired)
            .into_iter()
            .map(|(shard, _)| shard)
            .collect()
    }

    /// Connected matches with their pools, under a single lock acquisition.
    pub(crate) fn matching_connected(&self, desired: &TagSet) -> Vec<(Arc<Shard>, PoolHandle<P>)> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .shards
            .iter()
            .filter(|shard| inner.is_connected(shard) && shard.matches(desired))
            .map(|shard| {
                let handle = inner.pools[shard.name()].clone();
                (Arc::clone(shard), handle)
            })
            .collect()
    }

    /// The pool attached to `shard`, if any.
    pub fn pool_for(&self, shard: &Shard) -> Option<PoolHandle<P>> {
        self.inner
            .read()
            .expect("lock poisoned")
            .pools
            .get(shard.name())
            .cloned()
    }

    /// The shard owning the pool identified by `id`, if still attached.
    pub fn shard_for_pool(&self, id: PoolId) -> Option<Arc<Shard>> {
        self.inner
            .read()
            .expect("lock poisoned")
            .shard_for_pool
            .get(&id)
            .cloned()
    }

    /// Every attached pool, in shard insertion order.
    pub fn connected_pools(&self) -> Vec<PoolHandle<P>> {
        self.matching_connected(&TagSet::new())
            .into_iter()
            .map(|(_, handle)| handle)
            .collect()
    }

    /// Associate `pool` with `shard`, replacing any previous association for
    /// the shard. The caller is responsible for having released a replaced
    /// pool first; [`try_attach`](Self::try_attach) is the checked variant.
    pub fn attach_pool(&self, pool: P, shard: &Arc<Shard>) -> PoolHandle<P> {
        let handle = self.new_handle(pool);
        let mut inner = self.inner.write().expect("lock poisoned");
        if let Some(previous) = inner.pools.insert(shard.name().to_string(), handle.clone()) {
            inner.shard_for_pool.remove(&previous.id());
        }
        inner.shard_for_pool.insert(handle.id(), Arc::clone(shard));
        handle
    }

    /// Attach `pool` only if the shard is disconnected. On a lost race the
    /// rejected pool is handed back together with the winning handle so the
    /// caller can release it.
    pub(crate) fn try_attach(
        &self,
        pool: P,
        shard: &Arc<Shard>,
    ) -> Result<PoolHandle<P>, (P, PoolHandle<P>)> {
        let mut inner = self.inner.write().expect("lock poisoned");
        if let Some(existing) = inner.pools.get(shard.name()) {
            return Err((pool, existing.clone()));
        }
        let handle = self.new_handle(pool);
        inner.pools.insert(shard.name().to_string(), handle.clone());
        inner.shard_for_pool.insert(handle.id(), Arc::clone(shard));
        Ok(handle)
    }

    /// Drop the pool↔shard association for `id`, returning the shard that
    /// owned it. The pool resource itself is the driver's to release.
    pub fn detach_pool(&self, id: PoolId) -> Option<Arc<Shard>> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let shard = inner.shard_for_pool.remove(&id)?;
        inner.pools.remove(shard.name());
        Some(shard)
    }

    /// Forget every shard and pool association, returning the registry to
    /// its freshly-constructed state.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.shards.clear();
        inner.pools.clear();
        inner.shard_for_pool.clear();
    }

    fn new_handle(&self, pool: P) -> PoolHandle<P> {
        PoolHandle {
            id: PoolId(self.next_pool_id.fetch_add(1, Ordering::Relaxed)),
            pool,
        }
    }
}

impl<P> fmt::Debug for ShardRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().expect("lock poisoned");
        f.debug_struct("ShardRegistry")
            .field("shards", &inner.shards.len())
            .field("connected", &inner.pools.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubPool, spec};

    fn registry() -> ShardRegistry<StubPool> {
        ShardRegistry::new()
    }

    fn pool(database: &str) -> StubPool {
        StubPool {
            database: database.to_string(),
        }
    }

    #[test]
    fn test_add_derives_name_from_connection_and_sorted_tags() {
        let registry = registry();
        let shard = registry
            .add(spec("foo_db", &["foo", "feline", "canine"]))
            .unwrap();
        assert_eq!(shard.name(), "localhost:foo_db:root:canine,feline,foo");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_keeps_explicit_name() {
        let registry = registry();
        let shard = registry
            .add(spec("foo_db", &["foo"]).with_name("primary"))
            .unwrap();
        assert_eq!(shard.name(), "primary");
        assert!(registry.find_by_name("primary").is_ok());
    }

    #[test]
    fn test_add_rejects_duplicate_names() {
        let registry = registry();
        registry.add(spec("foo_db", &["foo"])).unwrap();
        let err = registry.add(spec("foo_db", &["foo"])).unwrap_err();
        assert!(err.to_string().contains("non-unique shard name"));
    }

    #[test]
    fn test_add_rejects_missing_tags() {
        let registry = registry();
        let err = registry.add(spec("foo_db", &[])).unwrap_err();
        assert!(err.to_string().contains("no tags for 'localhost:foo_db'"));
    }

    #[test]
    fn test_find_by_name_unknown_fails() {
        let registry = registry();
        let err = registry.find_by_name("nope").unwrap_err();
        assert!(matches!(err, ShardError::ShardNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_matching_shards_ignores_connection_state() {
        let registry = registry();
        registry.add(spec("foo_db", &["foo", "feline"])).unwrap();
        registry.add(spec("bar_db", &["bar", "feline"])).unwrap();

        let matches = registry.matching_shards(&["feline"].into_iter().collect());
        assert_eq!(matches.len(), 2);

        // Empty desired tags match everything.
        assert_eq!(registry.matching_shards(&TagSet::new()).len(), 2);
    }

    #[test]
    fn test_matching_connected_shards_requires_a_pool() {
        let registry = registry();
        let foo = registry.add(spec("foo_db", &["foo", "feline"])).unwrap();
        registry.add(spec("bar_db", &["bar", "feline"])).unwrap();

        let desired: TagSet = ["feline"].into_iter().collect();
        assert!(registry.matching_connected_shards(&desired).is_empty());

        registry.attach_pool(pool("foo_db"), &foo);
        let matches = registry.matching_connected_shards(&desired);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name(), foo.name());
    }

    #[test]
    fn test_connected_shards_preserve_insertion_order() {
        let registry = registry();
        let honk = registry.add(spec("honk_db", &["honk", "all"])).unwrap();
        let foo = registry.add(spec("foo_db", &["foo", "all"])).unwrap();
        let bar = registry.add(spec("bar_db", &["bar", "all"])).unwrap();

        // Attach out of order; lookup order must follow registration order.
        registry.attach_pool(pool("bar_db"), &bar);
        registry.attach_pool(pool("honk_db"), &honk);
        registry.attach_pool(pool("foo_db"), &foo);

        let names: Vec<_> = registry
            .matching_connected_shards(&TagSet::new())
            .iter()
            .map(|shard| shard.name().to_string())
            .collect();
        assert_eq!(names, vec![honk.name(), foo.name(), bar.name()]);
    }

    #[test]
    fn test_attach_detach_round_trip() {
        let registry = registry();
        let shard = registry.add(spec("foo_db", &["foo"])).unwrap();

        let handle = registry.attach_pool(pool("foo_db"), &shard);
        assert_eq!(registry.pool_for(&shard).unwrap().id(), handle.id());
        assert_eq!(
            registry.shard_for_pool(handle.id()).unwrap().name(),
            shard.name()
        );

        let owner = registry.detach_pool(handle.id()).unwrap();
        assert_eq!(owner.name(), shard.name());
        assert!(registry.pool_for(&shard).is_none());
        assert!(registry.shard_for_pool(handle.id()).is_none());
        assert!(registry.detach_pool(handle.id()).is_none());
    }

    #[test]
    fn test_try_attach_loses_race_to_existing_pool() {
        let registry = registry();
        let shard = registry.add(spec("foo_db", &["foo"])).unwrap();

        let winner = registry.try_attach(pool("foo_db"), &shard).unwrap();
        let (rejected, existing) = registry.try_attach(pool("foo_db"), &shard).unwrap_err();
        assert_eq!(existing.id(), winner.id());
        assert_eq!(rejected.database, "foo_db");
        assert_eq!(registry.connected_pools().len(), 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let registry = registry();
        let shard = registry.add(spec("foo_db", &["foo"])).unwrap();
        registry.attach_pool(pool("foo_db"), &shard);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.connected_pools().is_empty());
    }
}
