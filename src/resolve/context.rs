//! Context Stack - scoped values pushed by context-bearing tags
//!
//! A frame is pushed when a context-bearing tag (currently only `!For`) starts
//! resolving and popped when it finishes. Accessor tags address frames by kind
//! and depth: depth 0 is the innermost frame of that kind.
//!
//! The loop's "current (index, item)" pair lives in its frame, so nothing is
//! left behind on the tag itself once a resolution call returns.

use serde_json::Value;

/// Kind of context a frame provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    For,
}

/// Identity of the tag that owns a frame (address of the tag value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

impl ContextId {
    pub fn of<T: ?Sized>(tag: &T) -> Self {
        Self((tag as *const T).cast::<()>() as usize)
    }
}

/// One active context
#[derive(Debug, Clone, PartialEq)]
pub struct ContextFrame {
    pub id: ContextId,
    pub kind: ContextKind,
    current: Option<(usize, Value)>,
}

impl ContextFrame {
    /// Current `(index, item)` pair, `None` outside the loop body
    pub fn current(&self) -> Option<&(usize, Value)> {
        self.current.as_ref()
    }
}

/// Lookup failure: fewer active frames of the kind than `depth + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthOutOfRange {
    pub depth: usize,
    pub available: usize,
}

/// Ordered list of active frames, outermost first
#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<ContextFrame>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<&ContextFrame> {
        self.frames.last()
    }

    /// Push a frame unless the top frame already belongs to `id`.
    ///
    /// Returns whether a frame was pushed; only then should the caller pop.
    pub fn push(&mut self, id: ContextId, kind: ContextKind) -> bool {
        if self.top().is_some_and(|f| f.id == id) {
            return false;
        }
        self.frames.push(ContextFrame {
            id,
            kind,
            current: None,
        });
        true
    }

    pub fn pop(&mut self) -> Option<ContextFrame> {
        self.frames.pop()
    }

    /// Set (or clear) the current pair of the innermost frame owned by `id`
    pub fn set_current(&mut self, id: ContextId, pair: Option<(usize, Value)>) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.id == id) {
            frame.current = pair;
        }
    }

    /// `depth`-th innermost frame of `kind` that currently has a pair.
    ///
    /// Frames still resolving their iterable have no pair and are skipped, so
    /// an accessor inside a loop's iterable refers to the enclosing loop.
    pub fn lookup(
        &self,
        kind: ContextKind,
        depth: usize,
    ) -> Result<&(usize, Value), DepthOutOfRange> {
        let mut active = self
            .frames
            .iter()
            .rev()
            .filter(|f| f.kind == kind)
            .filter_map(|f| f.current.as_ref());

        match active.nth(depth) {
            Some(pair) => Ok(pair),
            None => Err(DepthOutOfRange {
                depth,
                available: self.active_count(kind),
            }),
        }
    }

    /// Number of frames of `kind` that currently have a pair
    pub fn active_count(&self, kind: ContextKind) -> usize {
        self.frames
            .iter()
            .filter(|f| f.kind == kind && f.current.is_some())
            .count()
    }
}
