//! Iteration primitives built on the router and tag context.
//!
//! All traversal is strictly sequential: the `&mut TagContext` argument
//! makes overlapping per-shard execution impossible by construction, which
//! is what keeps the context stack free of locking.

use std::sync::Arc;

use crate::context::TagContext;
use crate::driver::ShardDriver;
use crate::manager::ShardManager;
use crate::shard::Shard;
use crate::tags::{Tag, TagSet};

impl<D: ShardDriver> ShardManager<D> {
    /// Run `op` once per tag, in input order (duplicates included), each
    /// time inside a [`use_tags`](TagContext::use_tags) scope for that
    /// single tag.
    pub fn each_tag<I, T, E, F>(&self, ctx: &mut TagContext, tags: I, mut op: F) -> Result<(), E>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
        F: FnMut(&mut TagContext, &Tag) -> Result<(), E>,
    {
        for tag in tags {
            let tag = tag.into();
            let mut scope = ctx.use_tag(tag.clone());
            op(&mut scope, &tag)?;
        }
        Ok(())
    }

    /// Run `op` once per connected shard matching `filter_tags` (every
    /// connected shard when the filter is empty), in registry order, each
    /// time inside a [`force_tags`](TagContext::force_tags) scope for that
    /// shard's own tags.
    pub fn each_shard<I, T, E, F>(&self, ctx: &mut TagContext, filter_tags: I, mut op: F) -> Result<(), E>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
        F: FnMut(&mut TagContext, &Arc<Shard>) -> Result<(), E>,
    {
        self.map_shards(ctx, filter_tags, |ctx, shard| op(ctx, shard))
            .map(drop)
    }

    /// Same traversal as [`each_shard`](Self::each_shard), collecting each
    /// invocation's result in visit order.
    pub fn map_shards<I, T, R, E, F>(
        &self,
        ctx: &mut TagContext,
        filter_tags: I,
        mut op: F,
    ) -> Result<Vec<R>, E>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
        F: FnMut(&mut TagContext, &Arc<Shard>) -> Result<R, E>,
    {
        let filter: TagSet = filter_tags.into_iter().collect();
        let shards = self.registry().matching_connected_shards(&filter);

        let mut results = Vec::with_capacity(shards.len());
        for shard in &shards {
            let mut scope = ctx.force_tags(shard.tags().clone());
            results.push(op(&mut scope, shard)?);
        }
        Ok(results)
    }
}
