//! Loop tags - `!For` and its accessors
//!
//! `!For` is the only context-bearing tag. While its body is being resolved
//! the loop's frame holds the current `(index, item)` pair, which
//! `!ForItem n` / `!ForItemIndex n` read from the `n`-th innermost active loop.

use serde_json::Value;
use tracing::trace;

use super::{ResolveTag, TagContext};
use crate::ast::Node;
use crate::error::EntryInvalid;
use crate::resolve::{ContextKind, DepthOutOfRange, TagResolver};
use crate::util::type_name;

/// Resolve `item_body` once per element of `iterable`
#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub iterable: Node,
    pub item_body: Node,
}

impl For {
    pub fn new(iterable: impl Into<Node>, item_body: impl Into<Node>) -> Self {
        Self {
            iterable: iterable.into(),
            item_body: item_body.into(),
        }
    }
}

impl TagContext for For {
    fn context_kind(&self) -> ContextKind {
        ContextKind::For
    }
}

impl ResolveTag for For {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        let id = self.context_id();
        resolver.with_context(id, self.context_kind(), |r| {
            r.contexts_mut().set_current(id, None);
            let result = iterate(self, r);
            r.contexts_mut().set_current(id, None);
            result
        })
    }
}

fn iterate(tag: &For, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
    let id = tag.context_id();
    let items = into_items(resolver.resolve(&tag.iterable)?)?;
    trace!(items = items.len(), "for loop");

    let mut results = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        resolver.contexts_mut().set_current(id, Some((index, item)));
        results.push(resolver.resolve(&tag.item_body)?);
    }
    Ok(Value::Array(results))
}

/// Elements a resolved iterable yields: list items, mapping keys, characters
fn into_items(iterable: Value) -> Result<Vec<Value>, EntryInvalid> {
    match iterable {
        Value::Array(items) => Ok(items),
        Value::Object(map) => Ok(map.into_iter().map(|(k, _)| Value::String(k)).collect()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        other => Err(EntryInvalid::new(format!(
            "For: '{}' object is not iterable",
            type_name(&other)
        ))),
    }
}

/// Current item of the `depth`-th enclosing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForItem {
    pub depth: usize,
}

impl ForItem {
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }
}

impl ResolveTag for ForItem {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        resolver
            .contexts()
            .lookup(ContextKind::For, self.depth)
            .map(|(_, item)| item.clone())
            .map_err(|e| depth_error("ForItem", e))
    }
}

/// Current index of the `depth`-th enclosing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForItemIndex {
    pub depth: usize,
}

impl ForItemIndex {
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }
}

impl ResolveTag for ForItemIndex {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        resolver
            .contexts()
            .lookup(ContextKind::For, self.depth)
            .map(|(index, _)| Value::from(*index))
            .map_err(|e| depth_error("ForItemIndex", e))
    }
}

fn depth_error(tag: &str, err: DepthOutOfRange) -> EntryInvalid {
    if err.depth == 0 {
        EntryInvalid::new(format!("{} tags are only usable inside a For tag", tag))
    } else {
        EntryInvalid::new(format!(
            "Invalid {} tag depth: {} ({} active loops)",
            tag, err.depth, err.available
        ))
    }
}
