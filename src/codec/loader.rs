//! Loader - parse a blueprint and build its tags

use std::path::Path;

use serde_json::{Map, Number, Value};
use serde_yaml::value::TaggedValue;
use serde_yaml::Value as Yaml;
use tracing::{debug, warn};

use crate::ast::{Document, Entry, Metadata, Node};
use crate::error::{BlueprintError, Result};
use crate::tag::{
    Condition, Context, Env, Find, For, ForItem, ForItemIndex, Format, If, KeyOf, Tag,
};

const DOCUMENT_KEYS: &[&str] = &["version", "entries", "context", "metadata"];
const ENTRY_KEYS: &[&str] = &["model", "state", "conditions", "identifiers", "attrs", "id"];

/// Parse a blueprint from YAML text
pub fn load_str(source: &str) -> Result<Document> {
    let raw: Yaml = serde_yaml::from_str(source)?;
    let document = document(raw)?;
    debug!(entries = document.entries.len(), "blueprint loaded");
    Ok(document)
}

/// Read and parse a blueprint file
pub fn load_file(path: impl AsRef<Path>) -> Result<Document> {
    let source = std::fs::read_to_string(path.as_ref())?;
    load_str(&source)
}

fn invalid(reason: impl Into<String>) -> BlueprintError {
    BlueprintError::InvalidDocument {
        reason: reason.into(),
    }
}

// ═══════════════════════════════════════════════════════════════
// Document / entries
// ═══════════════════════════════════════════════════════════════

fn document(raw: Yaml) -> Result<Document> {
    let Yaml::Mapping(mapping) = raw else {
        return Err(invalid("top level must be a mapping"));
    };

    let mut document = Document::new();
    for (key, value) in mapping {
        let key = key_text(&key)?;
        match key.as_str() {
            "version" => {
                document.version = value
                    .as_i64()
                    .ok_or_else(|| invalid("`version` must be an integer"))?;
            }
            "entries" => {
                document.entries = match value {
                    Yaml::Null => Vec::new(),
                    Yaml::Sequence(items) => items
                        .into_iter()
                        .enumerate()
                        .map(|(index, item)| entry(index, item))
                        .collect::<Result<_>>()?,
                    _ => return Err(invalid("`entries` must be a list")),
                };
            }
            "context" => document.context = context(value)?,
            "metadata" => {
                if !value.is_null() {
                    let metadata: Metadata = serde_yaml::from_value(value)
                        .map_err(|e| invalid(format!("metadata: {}", e)))?;
                    document.metadata = Some(metadata);
                }
            }
            other => {
                warn!(key = other, expected = ?DOCUMENT_KEYS, "ignoring unknown blueprint key")
            }
        }
    }

    Ok(document)
}

fn context(value: Yaml) -> Result<Map<String, Value>> {
    match value {
        Yaml::Null => Ok(Map::new()),
        Yaml::Mapping(_) => match plain(value)? {
            Value::Object(map) => Ok(map),
            _ => Err(invalid("`context` must be a mapping")),
        },
        _ => Err(invalid("`context` must be a mapping")),
    }
}

fn entry(index: usize, raw: Yaml) -> Result<Entry> {
    let Yaml::Mapping(mapping) = raw else {
        return Err(invalid(format!("entry #{} must be a mapping", index)));
    };

    let mut model = None;
    let mut entry = Entry::new(Node::null());
    for (key, value) in mapping {
        let key = key_text(&key)?;
        match key.as_str() {
            "model" => model = Some(node(value)?),
            "state" => entry.state = node(value)?,
            "conditions" => {
                entry.conditions = match value {
                    Yaml::Null => Vec::new(),
                    Yaml::Sequence(items) => items.into_iter().map(node).collect::<Result<_>>()?,
                    _ => {
                        return Err(invalid(format!(
                            "entry #{}: `conditions` must be a list",
                            index
                        )))
                    }
                };
            }
            "identifiers" => entry.identifiers = node(value)?,
            "attrs" => entry.attrs = node(value)?,
            "id" => {
                entry.id = match value {
                    Yaml::Null => None,
                    other => Some(scalar_text(&other).ok_or_else(|| {
                        invalid(format!("entry #{}: `id` must be a scalar", index))
                    })?),
                };
            }
            other => {
                warn!(
                    entry = index,
                    key = other,
                    expected = ?ENTRY_KEYS,
                    "ignoring unknown entry key"
                )
            }
        }
    }

    entry.model = model.ok_or_else(|| invalid(format!("entry #{} has no `model`", index)))?;
    Ok(entry)
}

// ═══════════════════════════════════════════════════════════════
// Nodes
// ═══════════════════════════════════════════════════════════════

/// Convert a YAML value that may contain tags
fn node(value: Yaml) -> Result<Node> {
    match value {
        Yaml::Tagged(tagged) => Ok(Node::from(tag(*tagged)?)),
        Yaml::Sequence(items) => {
            let items = items.into_iter().map(node).collect::<Result<Vec<_>>>()?;
            if items.iter().any(Node::contains_tags) {
                Ok(Node::Seq(items))
            } else {
                Ok(Node::Value(Value::Array(items.into_iter().map(into_value).collect())))
            }
        }
        Yaml::Mapping(mapping) => {
            let entries = mapping
                .into_iter()
                .map(|(k, v)| -> Result<(String, Node)> { Ok((key_text(&k)?, node(v)?)) })
                .collect::<Result<Vec<_>>>()?;
            if entries.iter().any(|(_, n)| n.contains_tags()) {
                Ok(Node::Map(entries))
            } else {
                let map = entries.into_iter().map(|(k, n)| (k, into_value(n))).collect();
                Ok(Node::Value(Value::Object(map)))
            }
        }
        other => plain(other).map(Node::Value),
    }
}

/// Tag-free node to value (only called once `contains_tags` is false)
fn into_value(node: Node) -> Value {
    match node {
        Node::Value(value) => value,
        Node::Seq(items) => Value::Array(items.into_iter().map(into_value).collect()),
        Node::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, n)| (k, into_value(n)))
                .collect(),
        ),
        Node::Tag(_) => Value::Null,
    }
}

/// Convert a YAML value that must not contain tags
fn plain(value: Yaml) -> Result<Value> {
    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => number(&n)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(plain).collect::<Result<_>>()?),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| -> Result<(String, Value)> { Ok((key_text(&k)?, plain(v)?)) })
                .collect::<Result<_>>()?,
        ),
        Yaml::Tagged(tagged) => {
            return Err(invalid(format!(
                "tag {} is not allowed here",
                tagged.tag
            )))
        }
    })
}

fn number(n: &serde_yaml::Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::from(i))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::from(u))
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid(format!("unsupported number '{}'", n)))
    }
}

fn key_text(key: &Yaml) -> Result<String> {
    scalar_text(key).ok_or_else(|| invalid("mapping keys must be scalars"))
}

/// Text of a scalar as written (strings, numbers, booleans)
fn scalar_text(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════
// Tags
// ═══════════════════════════════════════════════════════════════

/// Defaults of `!Env` / `!Context` keep the scalar text as written
fn scalar_default(name: &str, default: Option<Yaml>) -> Result<Option<Value>> {
    default
        .filter(|d| !d.is_null())
        .map(|d| scalar(name, &d).map(Value::String))
        .transpose()
}

fn tag(tagged: TaggedValue) -> Result<Tag> {
    let name = tagged.tag.to_string();
    let name = name.trim_start_matches('!');
    let value = tagged.value;

    let tag = match name {
        "KeyOf" => Tag::KeyOf(KeyOf::new(scalar(name, &value)?)),
        "Env" => {
            let (key, default) = key_with_default(name, value)?;
            Tag::Env(Env::new(key, scalar_default(name, default)?))
        }
        "Context" => {
            let (key, default) = key_with_default(name, value)?;
            Tag::Context(Context::new(key, scalar_default(name, default)?))
        }
        "Format" => {
            let mut items = sequence(name, value, 1..=usize::MAX)?.into_iter();
            let template = first_scalar(name, items.next())?;
            Tag::Format(Format::new(template, items.map(node).collect::<Result<_>>()?))
        }
        "Find" => {
            let mut items = sequence(name, value, 1..=usize::MAX)?.into_iter();
            let mut find = Find::new(first_scalar(name, items.next())?);
            for condition in items {
                let mut pair = sequence(name, condition, 2..=2)?.into_iter();
                if let (Some(key), Some(value)) = (pair.next(), pair.next()) {
                    find = find.with_condition(node(key)?, node(value)?);
                }
            }
            Tag::Find(find)
        }
        "Condition" => {
            let mut items = sequence(name, value, 1..=usize::MAX)?.into_iter();
            let mode = first_scalar(name, items.next())?;
            Tag::Condition(Condition::new(mode, items.map(node).collect::<Result<_>>()?))
        }
        "If" => {
            let mut items = sequence(name, value, 3..=3)?.into_iter().map(node);
            match (items.next(), items.next(), items.next()) {
                (Some(c), Some(t), Some(f)) => Tag::If(If::new(c?, t?, f?)),
                _ => {
                    return Err(BlueprintError::tag_syntax(
                        name,
                        "expected [condition, when_true, when_false]",
                    ))
                }
            }
        }
        "For" => {
            let mut items = sequence(name, value, 2..=2)?.into_iter().map(node);
            match (items.next(), items.next()) {
                (Some(iterable), Some(body)) => Tag::For(For::new(iterable?, body?)),
                _ => return Err(BlueprintError::tag_syntax(name, "expected [iterable, item_body]")),
            }
        }
        "ForItem" => Tag::ForItem(ForItem::new(depth(name, &value)?)),
        "ForItemIndex" => Tag::ForItemIndex(ForItemIndex::new(depth(name, &value)?)),
        other => {
            return Err(BlueprintError::UnknownTag {
                tag: other.to_string(),
            })
        }
    };
    Ok(tag)
}

fn scalar(tag: &str, value: &Yaml) -> Result<String> {
    scalar_text(value).ok_or_else(|| BlueprintError::tag_syntax(tag, "expected a scalar"))
}

fn first_scalar(tag: &str, value: Option<Yaml>) -> Result<String> {
    match value {
        Some(v) => scalar(tag, &v),
        None => Err(BlueprintError::tag_syntax(tag, "missing first argument")),
    }
}

fn sequence(tag: &str, value: Yaml, len: std::ops::RangeInclusive<usize>) -> Result<Vec<Yaml>> {
    match value {
        Yaml::Sequence(items) if len.contains(&items.len()) => Ok(items),
        Yaml::Sequence(items) => Err(BlueprintError::tag_syntax(
            tag,
            format!("unexpected number of arguments ({})", items.len()),
        )),
        _ => Err(BlueprintError::tag_syntax(tag, "expected a sequence")),
    }
}

/// `KEY` or `[KEY, default]`
fn key_with_default(tag: &str, value: Yaml) -> Result<(String, Option<Yaml>)> {
    match value {
        Yaml::Sequence(_) => {
            let mut items = sequence(tag, value, 1..=2)?.into_iter();
            let key = first_scalar(tag, items.next())?;
            Ok((key, items.next()))
        }
        other => Ok((scalar(tag, &other)?, None)),
    }
}

fn depth(tag: &str, value: &Yaml) -> Result<usize> {
    let parsed = match value {
        Yaml::Number(n) => n.as_i64(),
        Yaml::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(d) if d >= 0 => usize::try_from(d)
            .map_err(|_| BlueprintError::tag_syntax(tag, "depth is too large")),
        Some(_) => Err(BlueprintError::tag_syntax(
            tag,
            "depth must be a positive number or zero",
        )),
        None => Err(BlueprintError::tag_syntax(tag, "depth must be an integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::SUPPORTED_VERSION;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn first_attr(source: &str, key: &str) -> Node {
        let doc = load_str(source).unwrap();
        doc.entries[0].attrs.get(key).cloned().unwrap()
    }

    #[test]
    fn loads_minimal_document() {
        let doc = load_str(
            r#"
version: 1
entries:
  - model: authentik_core.group
    identifiers:
      name: admins
"#,
        )
        .unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.entries.len(), 1);
        let entry = &doc.entries[0];
        assert_eq!(entry.model.as_str(), Some("authentik_core.group"));
        assert_eq!(entry.state.as_str(), Some("present"));
        assert_eq!(entry.identifiers, Node::Value(json!({"name": "admins"})));
    }

    #[test]
    fn version_defaults_to_one() {
        let doc = load_str("entries: []").unwrap();
        assert_eq!(doc.version, SUPPORTED_VERSION);
    }

    #[test]
    fn builds_every_tag() {
        let source = r#"
entries:
  - model: a.b
    attrs:
      key: !KeyOf flow
      env: !Env [HOME, /root]
      ctx: !Context [debug, false]
      fmt: !Format ["%s-%d", a, 1]
      find: !Find [authentik_core.group, [name, admins]]
      cond: !Condition [or, true, false]
      when: !If [true, a, b]
      loop: !For [[1, 2], !ForItem 0]
      idx: !ForItemIndex "1"
"#;
        let doc = load_str(source).unwrap();
        let attrs = &doc.entries[0].attrs;
        let tag = |key: &str| match attrs.get(key) {
            Some(Node::Tag(tag)) => tag.as_ref().clone(),
            other => panic!("{} is not a tag: {:?}", key, other),
        };

        assert_eq!(tag("key"), Tag::KeyOf(KeyOf::new("flow")));
        assert_eq!(tag("env"), Tag::Env(Env::new("HOME", Some(json!("/root")))));
        assert_eq!(tag("ctx"), Tag::Context(Context::new("debug", Some(json!("false")))));
        assert_eq!(
            tag("fmt"),
            Tag::Format(Format::new("%s-%d", vec![Node::from("a"), Node::from(json!(1))]))
        );
        assert_eq!(
            tag("find"),
            Tag::Find(Find::new("authentik_core.group").with_condition("name", "admins"))
        );
        assert_eq!(tag("cond").name(), "Condition");
        assert_eq!(tag("when").name(), "If");
        assert_eq!(
            tag("loop"),
            Tag::For(For::new(json!([1, 2]), Tag::ForItem(ForItem::new(0))))
        );
        assert_eq!(tag("idx"), Tag::ForItemIndex(ForItemIndex::new(1)));
    }

    #[test]
    fn env_default_keeps_scalar_text() {
        let node = first_attr(
            "entries:\n  - model: a.b\n    attrs:\n      port: !Env [PORT, 8000]\n",
            "port",
        );
        assert_eq!(node, Node::from(Tag::Env(Env::new("PORT", Some(json!("8000"))))));
    }

    #[test]
    fn context_default_keeps_scalar_text() {
        let node = first_attr(
            "entries:\n  - model: a.b\n    attrs:\n      port: !Context [port, 8000]\n",
            "port",
        );
        assert_eq!(node, Node::from(Tag::Context(Context::new("port", Some(json!("8000"))))));

        let err = load_str("entries:\n  - model: a.b\n    attrs:\n      x: !Context [k, {a: 1}]\n")
            .unwrap_err();
        assert!(matches!(err, BlueprintError::TagSyntax { .. }));
    }

    #[test]
    fn mixed_structures_keep_tags_in_place() {
        let node = first_attr(
            "entries:\n  - model: a.b\n    attrs:\n      list: [1, !Context x, {a: 2}]\n",
            "list",
        );
        match node {
            Node::Seq(items) => {
                assert_eq!(items[0], Node::from(json!(1)));
                assert!(items[1].is_tag());
                assert_eq!(items[2], Node::from(json!({"a": 2})));
            }
            other => panic!("expected a sequence node, got {:?}", other),
        }
    }

    #[test]
    fn aliases_expand_to_independent_tags() {
        let doc = load_str(
            r#"
entries:
  - model: a.b
    attrs:
      first: &loop !For [[1], !ForItem 0]
      second: *loop
"#,
        )
        .unwrap();
        let attrs = &doc.entries[0].attrs;
        match (attrs.get("first"), attrs.get("second")) {
            (Some(Node::Tag(a)), Some(Node::Tag(b))) => {
                assert_eq!(a, b);
                assert!(!std::sync::Arc::ptr_eq(a, b));
            }
            other => panic!("expected two tags, got {:?}", other),
        }
    }

    #[test]
    fn unknown_and_malformed_tags_are_rejected() {
        let err = load_str("entries:\n  - model: a.b\n    attrs: {x: !Nope 1}\n").unwrap_err();
        assert!(matches!(err, BlueprintError::UnknownTag { ref tag } if tag == "Nope"));

        let err =
            load_str("entries:\n  - model: a.b\n    attrs: {x: !If [true, a]}\n").unwrap_err();
        assert_eq!(err.code(), "BP-010");

        let err = load_str("entries:\n  - model: a.b\n    attrs: {x: !ForItem -1}\n").unwrap_err();
        assert!(err.to_string().contains("depth must be a positive number or zero"));
    }

    #[test]
    fn context_must_be_plain() {
        let err = load_str("context:\n  x: !Env HOME\nentries: []\n").unwrap_err();
        assert!(err.to_string().contains("is not allowed here"));
    }

    #[test]
    fn entries_need_a_model() {
        let err = load_str("entries:\n  - attrs: {}\n").unwrap_err();
        assert!(err.to_string().contains("entry #0 has no `model`"));
    }

    #[test]
    fn metadata_and_context_are_loaded() {
        let doc = load_str(
            r#"
version: 1
metadata:
  name: Default flows
  labels:
    blueprints.goauthentik.io/system: "true"
context:
  domain: example.com
entries: []
"#,
        )
        .unwrap();
        let metadata = doc.metadata.unwrap();
        assert_eq!(metadata.name, "Default flows");
        assert_eq!(metadata.labels["blueprints.goauthentik.io/system"], "true");
        assert_eq!(doc.context["domain"], json!("example.com"));
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = load_str("entries: [").unwrap_err();
        assert_eq!(err.code(), "BP-001");
    }
}
