//! Lookup tags - values that come from outside the tag itself
//!
//! - `KeyOf`: primary key of an earlier entry's materialized instance
//! - `Env`: environment variable
//! - `Context`: document context
//! - `Find`: primary key of the first stored object matching a filter

use serde_json::Value;
use tracing::debug;

use super::ResolveTag;
use crate::ast::Node;
use crate::error::EntryInvalid;
use crate::resolve::TagResolver;
use crate::store::Query;
use crate::util::{type_name, POLICY_BINDING_MODEL};

// ═══════════════════════════════════════════════════════════════
// KeyOf
// ═══════════════════════════════════════════════════════════════

/// Reference another entry of the same document by its `id`
#[derive(Debug, Clone, PartialEq)]
pub struct KeyOf {
    pub id_from: String,
}

impl KeyOf {
    pub fn new(id_from: impl Into<String>) -> Self {
        Self {
            id_from: id_from.into(),
        }
    }
}

impl ResolveTag for KeyOf {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        let target = resolver
            .document()
            .entries
            .iter()
            .filter(|e| e.id.as_deref() == Some(self.id_from.as_str()))
            .find_map(|e| e.instance());

        let Some(instance) = target else {
            return Err(EntryInvalid::new(format!(
                "KeyOf: failed to find entry with `id` of `{}` and a model instance",
                self.id_from
            )));
        };

        // Policy bindings point at the binding-model key, not the object pk
        if let Some(binding_key) = &instance.binding_key {
            let model = resolver.entry_model()?;
            if model.is_some_and(|m| m.eq_ignore_ascii_case(POLICY_BINDING_MODEL)) {
                return Ok(binding_key.clone());
            }
        }

        Ok(instance.pk.clone())
    }
}

// ═══════════════════════════════════════════════════════════════
// Env / Context
// ═══════════════════════════════════════════════════════════════

/// Environment variable with optional default
#[derive(Debug, Clone, PartialEq)]
pub struct Env {
    pub key: String,
    pub default: Option<Value>,
}

impl Env {
    pub fn new(key: impl Into<String>, default: Option<Value>) -> Self {
        Self {
            key: key.into(),
            default,
        }
    }
}

impl ResolveTag for Env {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        match resolver.env().var(&self.key) {
            Some(value) => Ok(Value::String(value)),
            None => Ok(self.default.clone().unwrap_or(Value::Null)),
        }
    }
}

/// Document context value with optional default
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub key: String,
    pub default: Option<Value>,
}

impl Context {
    pub fn new(key: impl Into<String>, default: Option<Value>) -> Self {
        Self {
            key: key.into(),
            default,
        }
    }
}

impl ResolveTag for Context {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        match resolver.document().context.get(&self.key) {
            Some(value) => Ok(value.clone()),
            None => Ok(self.default.clone().unwrap_or(Value::Null)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Find
// ═══════════════════════════════════════════════════════════════

/// Look up an object in the entity store
#[derive(Debug, Clone, PartialEq)]
pub struct Find {
    pub model_name: String,
    /// `(lookup, value)` pairs, both sides may be tags
    pub conditions: Vec<(Node, Node)>,
}

impl Find {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, key: impl Into<Node>, value: impl Into<Node>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }
}

impl ResolveTag for Find {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        let mut query = Query::new(self.model_name.as_str());
        for (key, value) in &self.conditions {
            let key = match resolver.resolve(key)? {
                Value::String(key) => key,
                other => {
                    return Err(EntryInvalid::new(format!(
                        "Find: lookup keys must be strings, got {}",
                        type_name(&other)
                    )))
                }
            };
            let value = resolver.resolve(value)?;
            query = query.filter(key, value);
        }

        let pk = resolver
            .store()
            .first_pk(&query)
            .map_err(|e| EntryInvalid::new(format!("Find: {}", e.reason)))?;
        debug!(model = %self.model_name, found = pk.is_some(), "find");
        Ok(pk.unwrap_or(Value::Null))
    }
}
