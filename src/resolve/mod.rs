//! Resolve Module - recursive tag resolution (per entry)
//!
//! `TagResolver` walks a [`Node`] tree depth-first and returns a concrete
//! `serde_json::Value`:
//!
//! ```text
//! Node::Value  → owned copy
//! Node::Seq    → every element resolved, order kept
//! Node::Map    → every value resolved, keys kept
//! Node::Tag    → Tag::resolve (context-bearing tags push a frame first)
//! ```
//!
//! One resolver (and so one context stack) exists per top-level call on an
//! entry. The `Entry::get_*` accessors below each create their own.

mod context;

pub use context::{ContextFrame, ContextId, ContextKind, ContextStack, DepthOutOfRange};

use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{DesiredState, Document, Entry, Node};
use crate::error::EntryInvalid;
use crate::store::{EntityStore, EnvSource};
use crate::tag::Tag;
use crate::util::{display_str, is_truthy, type_name};

/// External collaborators a resolution may consult
#[derive(Clone, Copy)]
pub struct Externals<'a> {
    pub store: &'a dyn EntityStore,
    pub env: &'a dyn EnvSource,
}

impl<'a> Externals<'a> {
    pub fn new(store: &'a dyn EntityStore, env: &'a dyn EnvSource) -> Self {
        Self { store, env }
    }
}

/// Resolver for one entry, for one top-level call
pub struct TagResolver<'a> {
    entry: &'a Entry,
    document: &'a Document,
    externals: Externals<'a>,
    contexts: ContextStack,
    resolving_model: bool,
}

impl<'a> TagResolver<'a> {
    pub fn new(entry: &'a Entry, document: &'a Document, externals: Externals<'a>) -> Self {
        Self {
            entry,
            document,
            externals,
            contexts: ContextStack::new(),
            resolving_model: false,
        }
    }

    pub fn entry(&self) -> &'a Entry {
        self.entry
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn store(&self) -> &'a dyn EntityStore {
        self.externals.store
    }

    pub fn env(&self) -> &'a dyn EnvSource {
        self.externals.env
    }

    pub fn contexts(&self) -> &ContextStack {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut ContextStack {
        &mut self.contexts
    }

    /// Resolve a node to a concrete value
    pub fn resolve(&mut self, node: &Node) -> Result<Value, EntryInvalid> {
        match node {
            Node::Value(value) => Ok(value.clone()),
            Node::Seq(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Node::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.resolve(value)?);
                }
                Ok(Value::Object(map))
            }
            Node::Tag(tag) => self.resolve_tag(tag),
        }
    }

    /// Resolve a tag, pushing its context frame first when it has one
    pub fn resolve_tag(&mut self, tag: &Tag) -> Result<Value, EntryInvalid> {
        match tag.as_context() {
            Some(ctx) => {
                let (id, kind) = (ctx.context_id(), ctx.context_kind());
                self.with_context(id, kind, |r| tag.resolve(r))
            }
            None => tag.resolve(self),
        }
    }

    /// Run `f` with a frame for `id` on the stack.
    ///
    /// The frame is pushed only if it is not already on top, and popped on
    /// every exit path when this call pushed it.
    pub fn with_context<T>(
        &mut self,
        id: ContextId,
        kind: ContextKind,
        f: impl FnOnce(&mut Self) -> Result<T, EntryInvalid>,
    ) -> Result<T, EntryInvalid> {
        let pushed = self.contexts.push(id, kind);
        let result = f(self);
        if pushed {
            self.contexts.pop();
        }
        result
    }

    /// Model name of the entry being resolved, for tags that depend on it.
    ///
    /// Returns `None` when asked while the model itself is being resolved.
    pub fn entry_model(&mut self) -> Result<Option<String>, EntryInvalid> {
        let entry = self.entry;
        if let Some(model) = entry.model.as_str() {
            return Ok(Some(model.to_string()));
        }
        if self.resolving_model {
            return Ok(None);
        }
        self.resolving_model = true;
        let model = self.resolve(&entry.model);
        self.resolving_model = false;
        model.map(|v| Some(display_str(&v)))
    }
}

fn expect_mapping(field: &str, value: Value) -> Result<Map<String, Value>, EntryInvalid> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(EntryInvalid::new(format!(
            "`{}` must resolve to a mapping, got {}",
            field,
            type_name(&other)
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════
// Entry accessors
// ═══════════════════════════════════════════════════════════════

impl Entry {
    /// Resolve any value in the scope of this entry
    pub fn tag_resolver(
        &self,
        value: &Node,
        document: &Document,
        externals: Externals<'_>,
    ) -> Result<Value, EntryInvalid> {
        TagResolver::new(self, document, externals).resolve(value)
    }

    /// Attributes with all tags resolved
    pub fn get_attrs(
        &self,
        document: &Document,
        externals: Externals<'_>,
    ) -> Result<Map<String, Value>, EntryInvalid> {
        let attrs = self.tag_resolver(&self.attrs, document, externals)?;
        expect_mapping("attrs", attrs)
    }

    /// Identifiers with all tags resolved
    pub fn get_identifiers(
        &self,
        document: &Document,
        externals: Externals<'_>,
    ) -> Result<Map<String, Value>, EntryInvalid> {
        let identifiers = self.tag_resolver(&self.identifiers, document, externals)?;
        expect_mapping("identifiers", identifiers)
    }

    /// Desired state, with tags resolved if present
    pub fn get_state(
        &self,
        document: &Document,
        externals: Externals<'_>,
    ) -> Result<DesiredState, EntryInvalid> {
        match self.tag_resolver(&self.state, document, externals)? {
            Value::String(s) => s.parse(),
            other => Err(EntryInvalid::new(format!(
                "state must resolve to a string, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Model name, with tags resolved if present
    pub fn get_model(
        &self,
        document: &Document,
        externals: Externals<'_>,
    ) -> Result<String, EntryInvalid> {
        let model = self.tag_resolver(&self.model, document, externals)?;
        Ok(display_str(&model))
    }

    /// Whether every condition resolves to a truthy value (no conditions ⇒ true)
    pub fn check_all_conditions_match(
        &self,
        document: &Document,
        externals: Externals<'_>,
    ) -> Result<bool, EntryInvalid> {
        let mut resolver = TagResolver::new(self, document, externals);
        let resolved = self
            .conditions
            .iter()
            .map(|condition| resolver.resolve(condition))
            .collect::<Result<Vec<_>, _>>()?;

        match resolved.iter().position(|value| !is_truthy(value)) {
            Some(idx) => {
                debug!(condition = idx, "entry condition is falsy");
                Ok(false)
            }
            None => Ok(true),
        }
    }
}
