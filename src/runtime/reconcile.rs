//! Reconciler - sequential blueprint application
//!
//! Entries are handled strictly in declared order:
//!
//! ```text
//! conditions → state → model → identifiers → attrs → apply → set_instance
//! ```
//!
//! An entry's instance is recorded before the next entry is resolved, so a
//! `!KeyOf` can only reference entries declared earlier.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::apply::Applier;
use crate::ast::{DesiredState, Document, Entry};
use crate::error::{BlueprintError, EntryInvalid, Result};
use crate::event::{EventKind, EventLog};
use crate::resolve::Externals;

/// What to do when an entry fails to resolve or apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Stop at the first failing entry
    #[default]
    Abort,
    /// Record the failure and continue with the next entry
    Skip,
}

impl fmt::Display for OnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnError::Abort => f.write_str("abort"),
            OnError::Skip => f.write_str("skip"),
        }
    }
}

impl FromStr for OnError {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(OnError::Abort),
            "skip" => Ok(OnError::Skip),
            other => Err(format!("unknown error policy '{}' (expected abort or skip)", other)),
        }
    }
}

/// Entry with every field resolved to a concrete value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub model: String,
    pub state: DesiredState,
    pub identifiers: Map<String, Value>,
    pub attrs: Map<String, Value>,
    /// Primary key of the applied instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pk: Option<Value>,
}

/// Entry that failed under the `skip` policy
#[derive(Debug, Clone, PartialEq)]
pub struct FailedEntry {
    pub index: usize,
    pub id: Option<String>,
    pub error: EntryInvalid,
}

/// Outcome of a reconcile run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub applied: Vec<ResolvedEntry>,
    /// Indexes of entries whose conditions did not match
    pub skipped: Vec<usize>,
    pub failed: Vec<FailedEntry>,
    pub duration_ms: u64,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Resolved entries as a JSON list
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.applied).unwrap_or(Value::Null)
    }
}

/// Sequential reconcile driver
pub struct Reconciler<'a> {
    externals: Externals<'a>,
    applier: &'a dyn Applier,
    on_error: OnError,
    event_log: EventLog,
}

impl<'a> Reconciler<'a> {
    pub fn new(externals: Externals<'a>, applier: &'a dyn Applier) -> Self {
        Self {
            externals,
            applier,
            on_error: OnError::default(),
            event_log: EventLog::new(),
        }
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// Use an existing event log (e.g. one shared with the caller)
    pub fn with_event_log(mut self, event_log: EventLog) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Resolve and apply every entry of `document`, in order
    #[instrument(skip_all, fields(entries = document.entries.len(), on_error = %self.on_error))]
    pub fn run(&self, document: &Document) -> Result<ReconcileReport> {
        let started = Instant::now();
        let mut report = ReconcileReport::default();

        self.event_log.emit(EventKind::BlueprintStarted {
            name: document.metadata.as_ref().map(|m| m.name.clone()),
            entry_count: document.entries.len(),
        });

        for (index, entry) in document.entries.iter().enumerate() {
            let step_started = Instant::now();
            let result = self.resolve_entry(index, entry, document).and_then(|resolved| {
                resolved
                    .map(|r| self.applier.apply(&r).map(|instance| (r, instance)))
                    .transpose()
            });

            match result {
                Ok(None) => {
                    debug!(index, "entry skipped, conditions did not match");
                    self.event_log.emit(EventKind::EntrySkipped {
                        index,
                        id: entry.id.clone(),
                    });
                    report.skipped.push(index);
                }
                Ok(Some((mut resolved, instance))) => {
                    if let Some(instance) = instance {
                        resolved.pk = Some(instance.pk.clone());
                        entry
                            .set_instance(instance)
                            .map_err(|_| BlueprintError::AlreadyMaterialized { index })?;
                    }
                    self.event_log.emit(EventKind::EntryApplied {
                        index,
                        id: entry.id.clone(),
                        model: resolved.model.clone(),
                        pk: resolved.pk.clone(),
                        duration_ms: step_started.elapsed().as_millis() as u64,
                    });
                    report.applied.push(resolved);
                }
                Err(error) => {
                    self.event_log.emit(EventKind::EntryFailed {
                        index,
                        id: entry.id.clone(),
                        error: error.to_string(),
                    });
                    match self.on_error {
                        OnError::Abort => {
                            return Err(BlueprintError::EntryFailed {
                                index,
                                id: entry.id.clone(),
                                source: error,
                            })
                        }
                        OnError::Skip => {
                            warn!(index, error = %error, "entry failed, continuing");
                            report.failed.push(FailedEntry {
                                index,
                                id: entry.id.clone(),
                                error,
                            });
                        }
                    }
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        self.event_log.emit(EventKind::BlueprintCompleted {
            applied: report.applied.len(),
            skipped: report.skipped.len(),
            failed: report.failed.len(),
            total_duration_ms: report.duration_ms,
        });
        info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "blueprint reconciled"
        );
        Ok(report)
    }

    /// Resolve one entry; `None` when its conditions do not match
    fn resolve_entry(
        &self,
        index: usize,
        entry: &Entry,
        document: &Document,
    ) -> std::result::Result<Option<ResolvedEntry>, EntryInvalid> {
        let ext = self.externals;
        if !entry.check_all_conditions_match(document, ext)? {
            return Ok(None);
        }

        let resolved = ResolvedEntry {
            index,
            id: entry.id.clone(),
            state: entry.get_state(document, ext)?,
            model: entry.get_model(document, ext)?,
            identifiers: entry.get_identifiers(document, ext)?,
            attrs: entry.get_attrs(document, ext)?,
            pk: None,
        };

        self.event_log.emit(EventKind::EntryResolved {
            index,
            id: resolved.id.clone(),
            model: resolved.model.clone(),
            state: resolved.state.to_string(),
        });
        Ok(Some(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Instance, Node};
    use crate::store::{MapEnv, MemoryStore};
    use crate::tag::{KeyOf, Tag};
    use serde_json::json;

    /// Applier that hands out sequential integer pks
    struct Counter(std::sync::atomic::AtomicI64);

    impl Applier for Counter {
        fn apply(
            &self,
            entry: &ResolvedEntry,
        ) -> std::result::Result<Option<Instance>, EntryInvalid> {
            let pk = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Some(Instance::new(entry.model.clone(), pk)))
        }
    }

    fn counter() -> Counter {
        Counter(std::sync::atomic::AtomicI64::new(100))
    }

    fn key_of(id: &str) -> Node {
        Node::from(Tag::KeyOf(KeyOf::new(id)))
    }

    #[test]
    fn on_error_parses_and_displays() {
        assert_eq!("SKIP".parse::<OnError>().unwrap(), OnError::Skip);
        assert_eq!(OnError::default().to_string(), "abort");
        assert!("later".parse::<OnError>().is_err());
    }

    #[test]
    fn later_entries_see_earlier_instances() {
        let doc = Document::new()
            .with_entry(Entry::new("authentik_flows.flow").with_id("flow"))
            .with_entry(
                Entry::new("authentik_flows.flowstagebinding")
                    .with_attrs(Node::map([("target", key_of("flow"))])),
            );
        let (store, env, applier) = (MemoryStore::new(), MapEnv::new(), counter());
        let report = Reconciler::new(Externals::new(&store, &env), &applier)
            .run(&doc)
            .unwrap();

        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.applied[1].attrs["target"], json!(100));
        assert_eq!(doc.entries[0].instance().unwrap().pk, json!(100));
    }

    #[test]
    fn forward_reference_aborts_by_default() {
        let doc = Document::new()
            .with_entry(Entry::new("a.b").with_attrs(Node::map([("x", key_of("later"))])))
            .with_entry(Entry::new("a.c").with_id("later"));
        let (store, env, applier) = (MemoryStore::new(), MapEnv::new(), counter());
        let err = Reconciler::new(Externals::new(&store, &env), &applier)
            .run(&doc)
            .unwrap_err();
        assert!(matches!(err, BlueprintError::EntryFailed { index: 0, .. }));
        assert!(!doc.entries[1].is_materialized());
    }

    #[test]
    fn skip_policy_records_and_continues() {
        let doc = Document::new()
            .with_entry(Entry::new("a.b").with_attrs(Node::map([("x", key_of("nope"))])))
            .with_entry(Entry::new("a.c").with_condition(json!(false)))
            .with_entry(Entry::new("a.d"));
        let (store, env, applier) = (MemoryStore::new(), MapEnv::new(), counter());
        let reconciler = Reconciler::new(Externals::new(&store, &env), &applier)
            .with_on_error(OnError::Skip);
        let report = reconciler.run(&doc).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 0);
        assert_eq!(report.skipped, vec![1]);
        assert_eq!(report.applied.len(), 1);
        assert!(!report.is_success());

        let completed = reconciler.event_log().blueprint_events();
        assert_eq!(
            completed.last().unwrap().kind,
            EventKind::BlueprintCompleted {
                applied: 1,
                skipped: 1,
                failed: 1,
                total_duration_ms: report.duration_ms,
            }
        );
    }

    #[test]
    fn second_run_on_same_document_is_rejected() {
        let doc = Document::new().with_entry(Entry::new("a.b"));
        let (store, env, applier) = (MemoryStore::new(), MapEnv::new(), counter());
        let reconciler = Reconciler::new(Externals::new(&store, &env), &applier);
        reconciler.run(&doc).unwrap();
        let err = reconciler.run(&doc).unwrap_err();
        assert!(matches!(err, BlueprintError::AlreadyMaterialized { index: 0 }));
    }

    #[test]
    fn events_follow_entry_lifecycle() {
        let doc = Document::new().with_entry(Entry::new("a.b").with_id("only"));
        let (store, env, applier) = (MemoryStore::new(), MapEnv::new(), counter());
        let reconciler = Reconciler::new(Externals::new(&store, &env), &applier);
        reconciler.run(&doc).unwrap();

        let types: Vec<String> = reconciler
            .event_log()
            .events()
            .iter()
            .map(|e| serde_json::to_value(&e.kind).unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            types,
            vec!["blueprint_started", "entry_resolved", "entry_applied", "blueprint_completed"]
        );
    }
}
