//! Per-execution-unit tag scoping stack.
//!
//! A [`TagContext`] holds the active tag set and the entity-tags-disabled
//! flag for one logical unit of work (a request, a task, a worker thread).
//! It is an explicit value the caller owns and threads through its call
//! chain, never shared between concurrent units, so no locking applies.
//!
//! Scoped operations push a frame and return a [`TagScope`] guard; dropping
//! the guard restores the previous state. Because restoration lives in
//! `Drop`, it holds on normal returns, on `?` propagation, and during panic
//! unwinding alike.
//!
//! ```rust,ignore
//! let mut ctx = TagContext::new();
//! {
//!     let scope = ctx.use_tags(["reporting"])?;
//!     let pool = manager.resolve::<Invoice>(&scope)?;
//!     // ... run queries against `pool` ...
//! } // scope dropped, previous tags restored
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::ShardError;
use crate::tags::{Tag, TagSet};

/// One stack frame: the active tags and whether entity tags are ignored
/// during resolution for the extent of this frame.
#[derive(Debug, Clone)]
struct Frame {
    active: TagSet,
    entity_tags_disabled: bool,
}

impl Frame {
    fn root() -> Self {
        Self {
            active: TagSet::new(),
            entity_tags_disabled: false,
        }
    }
}

/// The tag scoping stack for one execution unit.
///
/// The root frame (no tags, entity tags enabled) is installed at
/// construction and is never popped.
#[derive(Debug, Clone)]
pub struct TagContext {
    frames: Vec<Frame>,
}

impl Default for TagContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TagContext {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::root()],
        }
    }

    fn current(&self) -> &Frame {
        self.frames.last().expect("tag context root frame missing")
    }

    fn current_mut(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("tag context root frame missing")
    }

    /// The active tag set of the innermost open scope.
    pub fn current_tags(&self) -> &TagSet {
        &self.current().active
    }

    /// Whether entity tags are ignored during resolution in the current scope.
    pub fn entity_tags_disabled(&self) -> bool {
        self.current().entity_tags_disabled
    }

    /// Number of currently-open scopes (zero at the root).
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Scope with the union of the current tags and `tags`.
    ///
    /// # Errors
    /// Rejects an empty `tags` argument with [`ShardError::EmptyTags`].
    pub fn use_tags<I, T>(&mut self, tags: I) -> Result<TagScope<'_>, ShardError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let tags: TagSet = tags.into_iter().collect();
        if tags.is_empty() {
            return Err(ShardError::EmptyTags {
                operation: "use_tags",
            });
        }
        let frame = Frame {
            active: self.current().active.union(&tags),
            entity_tags_disabled: self.current().entity_tags_disabled,
        };
        Ok(self.push_scope(frame))
    }

    /// Single-tag variant of [`use_tags`](Self::use_tags); infallible since
    /// the argument cannot be empty.
    pub fn use_tag(&mut self, tag: impl Into<Tag>) -> TagScope<'_> {
        let mut tags = self.current().active.clone();
        tags.insert(tag.into());
        let frame = Frame {
            active: tags,
            entity_tags_disabled: self.current().entity_tags_disabled,
        };
        self.push_scope(frame)
    }

    /// Scope whose active tags are exactly `tags`, discarding the tags of
    /// enclosing scopes. Entity tags still apply. An empty argument is
    /// allowed and means "entity tags only".
    pub fn replace_tags<I, T>(&mut self, tags: I) -> TagScope<'_>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let frame = Frame {
            active: tags.into_iter().collect(),
            entity_tags_disabled: self.current().entity_tags_disabled,
        };
        self.push_scope(frame)
    }

    /// Scope whose active tags are exactly `tags` and in which entity tags
    /// are ignored during resolution. An empty argument is allowed and means
    /// "match on context tags alone".
    pub fn force_tags<I, T>(&mut self, tags: I) -> TagScope<'_>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let frame = Frame {
            active: tags.into_iter().collect(),
            entity_tags_disabled: true,
        };
        self.push_scope(frame)
    }

    /// Add `tags` to the current scope without opening a new one.
    ///
    /// # Errors
    /// Rejects an empty `tags` argument with [`ShardError::EmptyTags`].
    pub fn add_tags<I, T>(&mut self, tags: I) -> Result<(), ShardError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let tags: TagSet = tags.into_iter().collect();
        if tags.is_empty() {
            return Err(ShardError::EmptyTags {
                operation: "add_tags",
            });
        }
        self.current_mut().active.extend(tags);
        Ok(())
    }

    /// Remove `tags` from the current scope without opening a new one.
    /// Removing a tag that is not present is not an error.
    ///
    /// # Errors
    /// Rejects an empty `tags` argument with [`ShardError::EmptyTags`].
    pub fn remove_tags<I, T>(&mut self, tags: I) -> Result<(), ShardError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let tags: TagSet = tags.into_iter().collect();
        if tags.is_empty() {
            return Err(ShardError::EmptyTags {
                operation: "remove_tags",
            });
        }
        for tag in &tags {
            self.current_mut().active.remove(tag);
        }
        Ok(())
    }

    /// Non-scoped variant of [`force_tags`](Self::force_tags) for callers
    /// that cannot bracket their work in a single lexical extent (e.g. a
    /// long-running batch driver). Pair with [`force_tags_pop`](Self::force_tags_pop).
    pub fn force_tags_push<I, T>(&mut self, tags: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        self.frames.push(Frame {
            active: tags.into_iter().collect(),
            entity_tags_disabled: true,
        });
    }

    /// Restore the state captured by the matching
    /// [`force_tags_push`](Self::force_tags_push). Popping past the pushed
    /// depth is a no-op; the root frame is never removed.
    pub fn force_tags_pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn push_scope(&mut self, frame: Frame) -> TagScope<'_> {
        let restore_depth = self.frames.len();
        self.frames.push(frame);
        TagScope {
            ctx: self,
            restore_depth,
        }
    }

    /// Drop frames down to `depth`, keeping the root.
    fn unwind_to(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }
}

/// RAII guard for an open tag scope.
///
/// Dereferences to the underlying [`TagContext`] so nested scopes and
/// resolution calls work through the guard. Dropping it unwinds the stack to
/// the depth captured at entry — even if the scope body pushed manual frames
/// it failed to pop.
#[must_use = "dropping the scope immediately restores the previous tag state"]
pub struct TagScope<'a> {
    ctx: &'a mut TagContext,
    restore_depth: usize,
}

impl Deref for TagScope<'_> {
    type Target = TagContext;

    fn deref(&self) -> &TagContext {
        self.ctx
    }
}

impl DerefMut for TagScope<'_> {
    fn deref_mut(&mut self) -> &mut TagContext {
        self.ctx
    }
}

impl Drop for TagScope<'_> {
    fn drop(&mut self) {
        self.ctx.unwind_to(self.restore_depth);
    }
}

impl fmt::Debug for TagScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagScope")
            .field("current_tags", self.ctx.current_tags())
            .field("restore_depth", &self.restore_depth)
            .finish()
    }
}
