//! Export - turn live objects back into blueprint entries
//!
//! An object that can be exported describes its fields through
//! [`SerializerModel`]. Only fields a blueprint could meaningfully set are kept:
//! read-only fields, fields still at their initial value and reverse relations
//! (`*_set`) are dropped.

use serde_json::{Map, Value};

use crate::ast::{Entry, Node};
use crate::util::constants::REVERSE_RELATION_SUFFIX;

/// Serialization contract of one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub read_only: bool,
    /// Value a freshly created object has for this field
    pub initial: Value,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only: false,
            initial: Value::Null,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_initial(mut self, initial: impl Into<Value>) -> Self {
        self.initial = initial.into();
        self
    }
}

/// Object that can be serialized into blueprint attributes
pub trait SerializerModel {
    fn app_label(&self) -> &str;
    fn model_name(&self) -> &str;
    fn pk(&self) -> Value;
    /// Serialized field data
    fn serialize(&self) -> Map<String, Value>;
    /// Field contracts of the serializer
    fn fields(&self) -> Vec<FieldSpec>;
}

/// Attributes of `obj` worth writing into a blueprint
pub fn get_attrs(obj: &dyn SerializerModel) -> Map<String, Value> {
    let mut data = obj.serialize();
    for field in obj.fields() {
        let Some(value) = data.get(&field.name) else {
            continue;
        };
        if field.read_only
            || *value == field.initial
            || field.name.ends_with(REVERSE_RELATION_SUFFIX)
        {
            data.remove(&field.name);
        }
    }
    data
}

impl Entry {
    /// Build an export entry from a live object.
    ///
    /// Identifiers are `pk` plus every name in `extra_identifiers`, moved out
    /// of the attributes (`null` when the object has no such attribute).
    pub fn from_model(obj: &dyn SerializerModel, extra_identifiers: &[&str]) -> Entry {
        let mut attrs = get_attrs(obj);
        let mut identifiers = Map::new();
        identifiers.insert("pk".to_string(), obj.pk());
        for name in extra_identifiers {
            let value = attrs.remove(*name).unwrap_or(Value::Null);
            identifiers.insert((*name).to_string(), value);
        }

        Entry::new(format!("{}.{}", obj.app_label(), obj.model_name()))
            .with_identifiers(Node::from(identifiers))
            .with_attrs(Node::from(attrs))
    }
}
