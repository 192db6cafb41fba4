//! Event log for reconcile runs
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: blueprint-level and entry-level variants
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the reconcile log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // BLUEPRINT LEVEL
    // ═══════════════════════════════════════════
    BlueprintStarted {
        name: Option<String>,
        entry_count: usize,
    },
    BlueprintCompleted {
        applied: usize,
        skipped: usize,
        failed: usize,
        total_duration_ms: u64,
    },

    // ═══════════════════════════════════════════
    // ENTRY LEVEL
    // ═══════════════════════════════════════════
    /// Conditions did not match
    EntrySkipped {
        index: usize,
        id: Option<String>,
    },
    /// All fields resolved to concrete values
    EntryResolved {
        index: usize,
        id: Option<String>,
        model: String,
        state: String,
    },
    EntryApplied {
        index: usize,
        id: Option<String>,
        model: String,
        pk: Option<Value>,
        duration_ms: u64,
    },
    EntryFailed {
        index: usize,
        id: Option<String>,
        error: String,
    },
}

impl EventKind {
    /// Index of the entry the event is about
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            Self::EntrySkipped { index, .. }
            | Self::EntryResolved { index, .. }
            | Self::EntryApplied { index, .. }
            | Self::EntryFailed { index, .. } => Some(*index),
            Self::BlueprintStarted { .. } | Self::BlueprintCompleted { .. } => None,
        }
    }

    pub fn is_blueprint_event(&self) -> bool {
        matches!(
            self,
            Self::BlueprintStarted { .. } | Self::BlueprintCompleted { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event, returning its ID
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };
        self.events.write().push(event);
        id
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Events about the entry at `index`
    pub fn filter_entry(&self, index: usize) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.entry_index() == Some(index))
            .collect()
    }

    pub fn blueprint_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_blueprint_event())
            .collect()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emit_assigns_monotonic_ids() {
        let log = EventLog::new();
        let a = log.emit(EventKind::BlueprintStarted {
            name: None,
            entry_count: 2,
        });
        let b = log.emit(EventKind::EntrySkipped { index: 0, id: None });
        assert_eq!((a, b), (0, 1));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn filter_entry_and_blueprint_events() {
        let log = EventLog::new();
        log.emit(EventKind::BlueprintStarted {
            name: Some("demo".into()),
            entry_count: 2,
        });
        log.emit(EventKind::EntrySkipped { index: 0, id: None });
        log.emit(EventKind::EntryFailed {
            index: 1,
            id: Some("x".into()),
            error: "boom".into(),
        });

        assert_eq!(log.filter_entry(1).len(), 1);
        assert_eq!(log.blueprint_events().len(), 1);
    }

    #[test]
    fn kinds_serialize_with_type_tag() {
        let kind = EventKind::EntryApplied {
            index: 3,
            id: Some("admins".into()),
            model: "authentik_core.group".into(),
            pk: Some(json!(7)),
            duration_ms: 1,
        };
        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["type"], "entry_applied");
        assert_eq!(value["pk"], 7);

        let log = EventLog::new();
        log.emit(kind);
        assert_eq!(log.to_json()[0]["kind"]["index"], 3);
    }

    #[test]
    fn clones_share_the_log() {
        let log = EventLog::new();
        let clone = log.clone();
        clone.emit(EventKind::EntrySkipped { index: 0, id: None });
        assert_eq!(log.len(), 1);
    }
}
