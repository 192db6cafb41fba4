//! Test utilities for Blueprint (test builds and the `test-fixtures` feature)
//!
//! Short builders for nodes and tags, plus a harness bundling the external
//! collaborators a resolution needs.
//!
//! # Usage
//!
//! ```rust,ignore
//! use blueprint::test_utils::*;
//!
//! let node = for_each(lit(json!([1, 2])), seq([index(0), item(0)]));
//! let harness = TestHarness::new().with_env("HOST", "example.com");
//! let value = entry.tag_resolver(&node, &doc, harness.externals())?;
//! ```

use serde_json::Value;

use crate::ast::{Document, Entry, Node};
use crate::error::EntryInvalid;
use crate::resolve::Externals;
use crate::store::{MapEnv, MemoryStore, Record};
use crate::tag::{
    Condition, Context, Env, Find, For, ForItem, ForItemIndex, Format, If, KeyOf, Tag,
};

// ═══════════════════════════════════════════════════════════════════════════
// NODE BUILDERS
// ═══════════════════════════════════════════════════════════════════════════

pub fn lit(value: Value) -> Node {
    Node::Value(value)
}

pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Node {
    Node::map(entries)
}

pub fn seq(items: impl IntoIterator<Item = Node>) -> Node {
    Node::seq(items)
}

// ═══════════════════════════════════════════════════════════════════════════
// TAG BUILDERS
// ═══════════════════════════════════════════════════════════════════════════

pub fn key_of(id: &str) -> Node {
    Node::from(Tag::KeyOf(KeyOf::new(id)))
}

pub fn env(key: &str, default: Option<&str>) -> Node {
    Node::from(Tag::Env(Env::new(key, default.map(Value::from))))
}

pub fn ctx(key: &str, default: Option<Value>) -> Node {
    Node::from(Tag::Context(Context::new(key, default)))
}

pub fn fmt(template: &str, args: impl IntoIterator<Item = Node>) -> Node {
    Node::from(Tag::Format(Format::new(template, args.into_iter().collect())))
}

/// `!Find [model, [k, v]...]` with literal keys
pub fn find(model: &str, conditions: impl IntoIterator<Item = (&'static str, Node)>) -> Node {
    let find = conditions
        .into_iter()
        .fold(Find::new(model), |f, (k, v)| f.with_condition(k, v));
    Node::from(Tag::Find(find))
}

pub fn cond(mode: &str, args: impl IntoIterator<Item = Node>) -> Node {
    Node::from(Tag::Condition(Condition::new(mode, args.into_iter().collect())))
}

pub fn if_(condition: Node, when_true: Node, when_false: Node) -> Node {
    Node::from(Tag::If(If::new(condition, when_true, when_false)))
}

pub fn for_each(iterable: Node, body: Node) -> Node {
    Node::from(Tag::For(For::new(iterable, body)))
}

pub fn item(depth: usize) -> Node {
    Node::from(Tag::ForItem(ForItem::new(depth)))
}

pub fn index(depth: usize) -> Node {
    Node::from(Tag::ForItemIndex(ForItemIndex::new(depth)))
}

// ═══════════════════════════════════════════════════════════════════════════
// HARNESS
// ═══════════════════════════════════════════════════════════════════════════

/// Store + environment for one test
#[derive(Clone, Default)]
pub struct TestHarness {
    pub store: MemoryStore,
    pub env: MapEnv,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env = self.env.with_var(key, value);
        self
    }

    /// Store one record (fields must be a JSON object)
    pub fn with_record(self, model: &str, pk: impl Into<Value>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        self.store.insert(model, Record::new(pk, fields));
        self
    }

    pub fn with_model(self, model: &str) -> Self {
        self.store.register(model);
        self
    }

    pub fn externals(&self) -> Externals<'_> {
        Externals::new(&self.store, &self.env)
    }

    /// Resolve `node` in the scope of the first entry of `doc`
    /// (or of a throwaway entry when the document has none)
    pub fn resolve(&self, doc: &Document, node: &Node) -> Result<Value, EntryInvalid> {
        match doc.entries.first() {
            Some(entry) => entry.tag_resolver(node, doc, self.externals()),
            None => Entry::new("test.entry").tag_resolver(node, doc, self.externals()),
        }
    }
}
