//! Node - declared value tree
//!
//! A node is what a blueprint field looks like before resolution: plain
//! values, sequences and mappings, any of which may hold a [`Tag`].
//!
//! Tags are held behind `Arc` so that a document stays `Send + Sync` and so
//! that a tag has a stable identity for the duration of a resolution call.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::tag::Tag;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Tag-free literal (scalar or already concrete subtree)
    Value(Value),
    /// Sequence whose elements may contain tags
    Seq(Vec<Node>),
    /// Mapping whose values may contain tags (declared key order is kept)
    Map(Vec<(String, Node)>),
    /// Deferred computation
    Tag(Arc<Tag>),
}

impl Node {
    pub fn null() -> Self {
        Node::Value(Value::Null)
    }

    /// Empty mapping, the default for `identifiers` and `attrs`
    pub fn empty_map() -> Self {
        Node::Map(Vec::new())
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Node::Tag(_))
    }

    /// Literal string content, if this node is a plain string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether any tag appears in this subtree
    pub fn contains_tags(&self) -> bool {
        match self {
            Node::Value(_) => false,
            Node::Tag(_) => true,
            Node::Seq(items) => items.iter().any(Node::contains_tags),
            Node::Map(entries) => entries.iter().any(|(_, n)| n.contains_tags()),
        }
    }

    /// Look up a key of a mapping node
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, n)| n),
            _ => None,
        }
    }

    /// Build a mapping node from `(key, node)` pairs
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Map(entries.into_iter().map(|(k, n)| (k.into(), n)).collect())
    }

    /// Build a sequence node
    pub fn seq(items: impl IntoIterator<Item = Node>) -> Self {
        Node::Seq(items.into_iter().collect())
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::null()
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Value(value)
    }
}

impl From<Map<String, Value>> for Node {
    fn from(map: Map<String, Value>) -> Self {
        Node::Value(Value::Object(map))
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Value(Value::String(s))
    }
}

impl From<Tag> for Node {
    fn from(tag: Tag) -> Self {
        Node::Tag(Arc::new(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::KeyOf;
    use serde_json::json;

    #[test]
    fn contains_tags_finds_nested_tags() {
        let plain = Node::map([("a", Node::seq([Node::from(json!(1))]))]);
        assert!(!plain.contains_tags());

        let tagged = Node::map([(
            "a",
            Node::seq([Node::from(Tag::KeyOf(KeyOf::new("x")))]),
        )]);
        assert!(tagged.contains_tags());
    }

    #[test]
    fn get_reads_mapping_keys() {
        let node = Node::map([("name", Node::from("admins"))]);
        assert_eq!(node.get("name").and_then(Node::as_str), Some("admins"));
        assert!(node.get("missing").is_none());
        assert!(Node::from("scalar").get("name").is_none());
    }

    #[test]
    fn default_is_null() {
        assert_eq!(Node::default(), Node::Value(Value::Null));
    }
}
