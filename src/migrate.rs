//! Running schema changes on their appropriate shards.
//!
//! A migration-runner collaborator supplies one [`Migration`] per unit of
//! schema change, each carrying the tags that select its target shard. The
//! [`ShardMigrator`] applies every change inside a
//! [`force_tags`](crate::context::TagContext::force_tags) scope for those
//! tags, so a migration only ever sees the shard it was written for.

use strum_macros::{AsRefStr, Display, EnumString};

use crate::context::TagContext;
use crate::driver::{DriverError, ShardDriver};
use crate::error::ShardError;
use crate::manager::ShardManager;
use crate::tags::TagSet;

/// Which way a schema change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MigrationDirection {
    Up,
    Down,
}

/// One unit of schema change, bound to the shard tags it applies to.
pub trait Migration<P> {
    /// Monotonic version used for ordering.
    fn version(&self) -> u64;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Tags selecting the shard this change runs against.
    fn tags(&self) -> TagSet;

    /// Execute the change against the resolved pool.
    fn apply(&self, direction: MigrationDirection, pool: &P) -> Result<(), DriverError>;
}

/// Applies migrations to their tag-matched shards, in version order.
pub struct ShardMigrator<'a, D: ShardDriver> {
    manager: &'a ShardManager<D>,
}

impl<'a, D: ShardDriver> ShardMigrator<'a, D> {
    pub fn new(manager: &'a ShardManager<D>) -> Self {
        Self { manager }
    }

    /// Run every migration in version order (reversed for
    /// [`MigrationDirection::Down`]), each inside a forced tag scope.
    ///
    /// # Errors
    /// Stops at the first resolution or application failure; the caller's
    /// tag context is restored regardless.
    pub fn run(
        &self,
        ctx: &mut TagContext,
        direction: MigrationDirection,
        migrations: &[&dyn Migration<D::Pool>],
    ) -> Result<(), ShardError> {
        let mut ordered: Vec<&dyn Migration<D::Pool>> = migrations.to_vec();
        ordered.sort_by_key(|migration| migration.version());
        if direction == MigrationDirection::Down {
            ordered.reverse();
        }

        for migration in ordered {
            let scope = ctx.force_tags(migration.tags());
            let (shard, handle) = self.manager.router().resolve(&scope, &TagSet::new())?;
            tracing::info!(
                host = %shard.connection().host,
                database = %shard.connection().database,
                version = migration.version(),
                migration = %migration.name(),
                %direction,
                "running migration"
            );
            migration
                .apply(direction, handle.pool())
                .map_err(ShardError::Driver)?;
        }
        Ok(())
    }
}
