//! Appliers - turning a resolved entry into a stored object
//!
//! How entries are durably applied to a real store is up to the embedder;
//! the crate ships a dry-run applier over [`MemoryStore`].

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::reconcile::ResolvedEntry;
use crate::ast::{DesiredState, Instance};
use crate::error::EntryInvalid;
use crate::store::{MemoryStore, Record};

/// Field holding the binding key of policy-binding models
const BINDING_KEY_FIELD: &str = "pbm_uuid";

/// Apply a resolved entry, returning the instance it now corresponds to
/// (`None` when nothing exists afterwards, e.g. after a removal)
pub trait Applier: Send + Sync {
    fn apply(&self, entry: &ResolvedEntry) -> Result<Option<Instance>, EntryInvalid>;
}

/// Applier that writes into a [`MemoryStore`]
#[derive(Clone, Default)]
pub struct DryRunApplier {
    store: MemoryStore,
    /// Models whose instances carry a binding key (lower-cased)
    binding_models: FxHashSet<String>,
}

impl DryRunApplier {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            binding_models: FxHashSet::default(),
        }
    }

    /// Treat instances of `model` as policy-binding models
    pub fn with_binding_model(mut self, model: &str) -> Self {
        self.binding_models.insert(model.to_ascii_lowercase());
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn existing(&self, entry: &ResolvedEntry) -> Option<Record> {
        match entry.identifiers.get("pk") {
            Some(pk) if !pk.is_null() => self.store.get(&entry.model, pk),
            _ => self.store.find_by_identifiers(&entry.model, &entry.identifiers),
        }
    }

    fn instance(&self, model: &str, record: &Record) -> Instance {
        let instance = Instance::new(model, record.pk.clone());
        match record.fields.get(BINDING_KEY_FIELD) {
            Some(key) if self.binding_models.contains(&model.to_ascii_lowercase()) => {
                instance.with_binding_key(key.clone())
            }
            _ => instance,
        }
    }

    fn write(&self, entry: &ResolvedEntry, existing: Option<Record>) -> Record {
        let mut fields = existing.as_ref().map(|r| r.fields.clone()).unwrap_or_default();
        merge(&mut fields, &entry.identifiers);
        merge(&mut fields, &entry.attrs);
        fields.remove("pk");

        let pk = match existing {
            Some(record) => record.pk,
            None => match entry.identifiers.get("pk") {
                Some(pk) if !pk.is_null() => pk.clone(),
                _ => Value::String(Uuid::new_v4().to_string()),
            },
        };

        if self.binding_models.contains(&entry.model.to_ascii_lowercase())
            && !fields.contains_key(BINDING_KEY_FIELD)
        {
            fields.insert(
                BINDING_KEY_FIELD.to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }

        let record = Record::new(pk, fields);
        self.store.upsert(&entry.model, record.clone());
        record
    }
}

impl Applier for DryRunApplier {
    fn apply(&self, entry: &ResolvedEntry) -> Result<Option<Instance>, EntryInvalid> {
        if entry.identifiers.is_empty() {
            return Err(EntryInvalid::new(format!(
                "No or invalid identifiers for entry #{}",
                entry.index
            ))
            .with_serializer_errors(
                serde_json::json!({"identifiers": ["This field is required."]}),
            ));
        }

        let existing = self.existing(entry);
        let record = match (entry.state, existing) {
            (DesiredState::Absent, Some(record)) => {
                debug!(model = %entry.model, pk = %record.pk, "removing");
                self.store.remove(&entry.model, &record.pk);
                return Ok(None);
            }
            (DesiredState::Absent, None) => return Ok(None),
            (DesiredState::Created, Some(record)) => record,
            (_, existing) => self.write(entry, existing),
        };

        Ok(Some(self.instance(&entry.model, &record)))
    }
}

fn merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolved(state: DesiredState, identifiers: Value, attrs: Value) -> ResolvedEntry {
        let into_map = |v: Value| match v {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ResolvedEntry {
            index: 0,
            id: None,
            model: "authentik_core.group".into(),
            state,
            identifiers: into_map(identifiers),
            attrs: into_map(attrs),
            pk: None,
        }
    }

    #[test]
    fn present_creates_then_updates() {
        let applier = DryRunApplier::new(MemoryStore::new());
        let first = applier
            .apply(&resolved(
                DesiredState::Present,
                json!({"name": "admins"}),
                json!({"is_superuser": false}),
            ))
            .unwrap()
            .unwrap();
        assert!(first.pk.is_string());

        let second = applier
            .apply(&resolved(
                DesiredState::Present,
                json!({"name": "admins"}),
                json!({"is_superuser": true}),
            ))
            .unwrap()
            .unwrap();
        assert_eq!(first.pk, second.pk);

        let record = applier.store().get("authentik_core.group", &first.pk).unwrap();
        assert_eq!(record.fields["is_superuser"], json!(true));
        assert_eq!(applier.store().len("authentik_core.group"), 1);
    }

    #[test]
    fn explicit_pk_is_kept() {
        let applier = DryRunApplier::new(MemoryStore::new());
        let instance = applier
            .apply(&resolved(DesiredState::Present, json!({"pk": 5}), json!({"name": "x"})))
            .unwrap()
            .unwrap();
        assert_eq!(instance.pk, json!(5));
        let record = applier.store().get("authentik_core.group", &json!(5)).unwrap();
        assert!(!record.fields.contains_key("pk"));
    }

    #[test]
    fn created_does_not_overwrite() {
        let applier = DryRunApplier::new(MemoryStore::new());
        applier
            .apply(&resolved(DesiredState::Present, json!({"pk": 1}), json!({"name": "old"})))
            .unwrap();
        applier
            .apply(&resolved(DesiredState::Created, json!({"pk": 1}), json!({"name": "new"})))
            .unwrap();
        let record = applier.store().get("authentik_core.group", &json!(1)).unwrap();
        assert_eq!(record.fields["name"], json!("old"));
    }

    #[test]
    fn absent_removes() {
        let applier = DryRunApplier::new(MemoryStore::new());
        applier
            .apply(&resolved(DesiredState::Present, json!({"name": "tmp"}), json!({})))
            .unwrap();
        let result = applier
            .apply(&resolved(DesiredState::Absent, json!({"name": "tmp"}), json!({})))
            .unwrap();
        assert!(result.is_none());
        assert!(applier.store().is_empty("authentik_core.group"));
    }

    #[test]
    fn binding_models_get_a_stable_binding_key() {
        let applier =
            DryRunApplier::new(MemoryStore::new()).with_binding_model("Authentik_Core.Group");
        let first = applier
            .apply(&resolved(DesiredState::Present, json!({"pk": 1}), json!({})))
            .unwrap()
            .unwrap();
        let second = applier
            .apply(&resolved(DesiredState::Present, json!({"pk": 1}), json!({"name": "n"})))
            .unwrap()
            .unwrap();
        assert!(first.is_policy_binding_model());
        assert_eq!(first.binding_key, second.binding_key);
    }

    #[test]
    fn empty_identifiers_are_rejected() {
        let applier = DryRunApplier::new(MemoryStore::new());
        let err = applier
            .apply(&resolved(DesiredState::Present, json!({}), json!({"name": "x"})))
            .unwrap_err();
        assert!(err.reason.starts_with("No or invalid identifiers"));
        assert!(err.serializer_errors.is_some());
    }
}
