//! MemoryStore - in-memory entity store with DashMap
//!
//! Records are grouped per model (lower-cased `app_label.model_name`).
//! Models must be registered before they can be queried, mirroring a real
//! store where an unknown model is an error rather than an empty result.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::trace;

use super::{EntityStore, Query};
use crate::error::EntryInvalid;

/// Case-insensitive exact match lookup suffix
const IEXACT: &str = "__iexact";

/// One stored object
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub pk: Value,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(pk: impl Into<Value>, fields: Map<String, Value>) -> Self {
        Self {
            pk: pk.into(),
            fields,
        }
    }

    /// Field value, with `pk` addressing the primary key
    pub fn field(&self, name: &str) -> Option<&Value> {
        if name == "pk" {
            Some(&self.pk)
        } else {
            self.fields.get(name)
        }
    }

    fn matches(&self, query: &Query) -> bool {
        query.filters.iter().all(|(lookup, expected)| {
            match lookup.strip_suffix(IEXACT) {
                Some(field) => match (self.field(field), expected) {
                    (Some(Value::String(actual)), Value::String(expected)) => {
                        actual.to_lowercase() == expected.to_lowercase()
                    }
                    (actual, expected) => actual == Some(expected),
                },
                None => self.field(lookup) == Some(expected),
            }
        })
    }
}

/// Thread-safe entity store (lock-free reads)
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// model → records in insertion order
    models: Arc<DashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `model` queryable (no-op if already registered)
    pub fn register(&self, model: &str) {
        self.models.entry(model_key(model)).or_default();
    }

    /// Builder form of [`MemoryStore::register`]
    pub fn with_model(self, model: &str) -> Self {
        self.register(model);
        self
    }

    pub fn is_registered(&self, model: &str) -> bool {
        self.models.contains_key(&model_key(model))
    }

    /// Append a record, registering the model if needed
    pub fn insert(&self, model: &str, record: Record) {
        self.models.entry(model_key(model)).or_default().push(record);
    }

    /// Replace the record with the same pk, or append.
    ///
    /// Returns whether an existing record was replaced.
    pub fn upsert(&self, model: &str, record: Record) -> bool {
        let mut records = self.models.entry(model_key(model)).or_default();
        match records.iter_mut().find(|r| r.pk == record.pk) {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                records.push(record);
                false
            }
        }
    }

    /// Remove the record with `pk`, returning it
    pub fn remove(&self, model: &str, pk: &Value) -> Option<Record> {
        let mut records = self.models.get_mut(&model_key(model))?;
        let idx = records.iter().position(|r| &r.pk == pk)?;
        Some(records.remove(idx))
    }

    pub fn get(&self, model: &str, pk: &Value) -> Option<Record> {
        self.models
            .get(&model_key(model))
            .and_then(|records| records.iter().find(|r| &r.pk == pk).cloned())
    }

    /// First record whose fields equal every given identifier
    pub fn find_by_identifiers(
        &self,
        model: &str,
        identifiers: &Map<String, Value>,
    ) -> Option<Record> {
        let query = identifiers
            .iter()
            .fold(Query::new(model), |q, (k, v)| q.filter(k.clone(), v.clone()));
        self.models
            .get(&model_key(model))
            .and_then(|records| records.iter().find(|r| r.matches(&query)).cloned())
    }

    /// Number of records stored for `model`
    pub fn len(&self, model: &str) -> usize {
        self.models.get(&model_key(model)).map_or(0, |r| r.len())
    }

    pub fn is_empty(&self, model: &str) -> bool {
        self.len(model) == 0
    }

    /// All records of `model`, in insertion order
    pub fn records(&self, model: &str) -> Vec<Record> {
        self.models
            .get(&model_key(model))
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }
}

impl EntityStore for MemoryStore {
    fn first_pk(&self, query: &Query) -> Result<Option<Value>, EntryInvalid> {
        let records = self
            .models
            .get(&model_key(&query.model))
            .ok_or_else(|| EntryInvalid::new(format!("Unknown model '{}'", query.model)))?;

        let found = records.iter().find(|r| r.matches(query)).map(|r| r.pk.clone());
        trace!(
            model = %query.model,
            filters = query.filters.len(),
            hit = found.is_some(),
            "store query"
        );
        Ok(found)
    }
}

fn model_key(model: &str) -> String {
    model.to_ascii_lowercase()
}
