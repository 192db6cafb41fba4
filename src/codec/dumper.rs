//! Dumper - write documents and resolved values back to YAML
//!
//! Only declared data is written: materialized instances are runtime state
//! and never appear in the output.

use serde_json::Value;
use serde_yaml::value::{Tag as YamlTag, TaggedValue};
use serde_yaml::{Mapping, Value as Yaml};

use crate::ast::{Document, Entry, Node};
use crate::error::{BlueprintError, Result};
use crate::tag::Tag;

/// Serialize a document (tags are written as YAML tags)
pub fn dump(document: &Document) -> Result<String> {
    write(&to_yaml(document)?)
}

/// Serialize a resolved value
pub fn dump_value(value: &Value) -> Result<String> {
    write(&json(value)?)
}

/// YAML tree of a document
pub fn to_yaml(document: &Document) -> Result<Yaml> {
    let mut root = Mapping::new();
    root.insert("version".into(), Yaml::from(document.version));

    if let Some(metadata) = &document.metadata {
        root.insert("metadata".into(), serde_yaml::to_value(metadata).map_err(dump_error)?);
    }
    if !document.context.is_empty() {
        root.insert(
            "context".into(),
            json(&Value::Object(document.context.clone()))?,
        );
    }

    let entries = document
        .entries
        .iter()
        .map(entry)
        .collect::<Result<Vec<_>>>()?;
    root.insert("entries".into(), Yaml::Sequence(entries));
    Ok(Yaml::Mapping(root))
}

fn write(value: &Yaml) -> Result<String> {
    serde_yaml::to_string(value).map_err(dump_error)
}

fn dump_error(e: serde_yaml::Error) -> BlueprintError {
    BlueprintError::DumpError {
        details: e.to_string(),
    }
}

fn json(value: &Value) -> Result<Yaml> {
    serde_yaml::to_value(value).map_err(dump_error)
}

fn entry(entry: &Entry) -> Result<Yaml> {
    let mut map = Mapping::new();
    map.insert("model".into(), node(&entry.model)?);
    map.insert("state".into(), node(&entry.state)?);
    if let Some(id) = &entry.id {
        map.insert("id".into(), Yaml::from(id.as_str()));
    }
    if !entry.conditions.is_empty() {
        let conditions = entry.conditions.iter().map(node).collect::<Result<Vec<_>>>()?;
        map.insert("conditions".into(), Yaml::Sequence(conditions));
    }
    map.insert("identifiers".into(), node(&entry.identifiers)?);
    map.insert("attrs".into(), node(&entry.attrs)?);
    Ok(Yaml::Mapping(map))
}

fn node(node: &Node) -> Result<Yaml> {
    match node {
        Node::Value(value) => json(value),
        Node::Seq(items) => Ok(Yaml::Sequence(
            items.iter().map(self::node).collect::<Result<_>>()?,
        )),
        Node::Map(entries) => {
            let mut map = Mapping::new();
            for (key, value) in entries {
                map.insert(Yaml::from(key.as_str()), self::node(value)?);
            }
            Ok(Yaml::Mapping(map))
        }
        Node::Tag(tag_value) => tag(tag_value),
    }
}

fn tagged(name: &str, value: Yaml) -> Yaml {
    Yaml::Tagged(Box::new(TaggedValue {
        tag: YamlTag::new(name),
        value,
    }))
}

fn seq(items: impl IntoIterator<Item = Result<Yaml>>) -> Result<Yaml> {
    Ok(Yaml::Sequence(items.into_iter().collect::<Result<_>>()?))
}

fn tag(tag: &Tag) -> Result<Yaml> {
    let value = match tag {
        Tag::KeyOf(t) => Yaml::from(t.id_from.as_str()),
        Tag::Env(t) => key_with_default(&t.key, t.default.as_ref())?,
        Tag::Context(t) => key_with_default(&t.key, t.default.as_ref())?,
        Tag::Format(t) => seq(
            std::iter::once(Ok(Yaml::from(t.format_string.as_str())))
                .chain(t.args.iter().map(node)),
        )?,
        Tag::Find(t) => seq(
            std::iter::once(Ok(Yaml::from(t.model_name.as_str()))).chain(
                t.conditions
                    .iter()
                    .map(|(k, v)| seq([node(k), node(v)])),
            ),
        )?,
        Tag::Condition(t) => seq(
            std::iter::once(Ok(Yaml::from(t.mode.as_str()))).chain(t.args.iter().map(node)),
        )?,
        Tag::If(t) => seq([node(&t.condition), node(&t.when_true), node(&t.when_false)])?,
        Tag::For(t) => seq([node(&t.iterable), node(&t.item_body)])?,
        Tag::ForItem(t) => Yaml::from(t.depth as u64),
        Tag::ForItemIndex(t) => Yaml::from(t.depth as u64),
    };
    Ok(tagged(tag.name(), value))
}

fn key_with_default(key: &str, default: Option<&Value>) -> Result<Yaml> {
    match default {
        None => Ok(Yaml::from(key)),
        Some(default) => Ok(Yaml::Sequence(vec![Yaml::from(key), json(default)?])),
    }
}
