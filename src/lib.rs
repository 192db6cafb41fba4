//! Blueprint - declarative entries with a YAML tag resolution engine
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  ast/       Document, Entry, Node, DesiredState              │
//! │  tag/       KeyOf Env Context Format Find Condition If For   │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  resolve/   TagResolver + per-call ContextStack              │
//! │  runtime/   Reconciler, Applier, DryRunApplier               │
//! │  export     Live objects → entries (SerializerModel)         │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  codec/     YAML loader / dumper (serde_yaml)                │
//! │  store/     EntityStore, MemoryStore (DashMap), EnvSource    │
//! │  event/     Event log (EventLog, EventKind)                  │
//! │  util/      Constants, truthiness, value rendering           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ast`] | Blueprint data model, write-once instance slot |
//! | [`tag`] | Tag variants and their resolution contracts |
//! | [`resolve`] | Recursive resolution, context stack, entry accessors |
//! | [`runtime`] | Sequential reconcile loop with error policy |
//! | [`codec`] | YAML ↔ document conversion |
//! | [`store`] | Entity lookup and environment facades |
//! | [`event`] | Audit trail of reconcile runs |
//! | [`error`] | Error types with fix suggestions |

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL
// ═══════════════════════════════════════════════════════════════
pub mod ast;
pub mod tag;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER
// ═══════════════════════════════════════════════════════════════
pub mod export;
pub mod resolve;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER
// ═══════════════════════════════════════════════════════════════
pub mod codec;
pub mod event;
pub mod store;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod test_utils;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

pub use error::{BlueprintError, EntryInvalid, FixSuggestion};

pub use config::BlueprintConfig;

pub use ast::{DesiredState, Document, Entry, Instance, Metadata, Node};

pub use tag::{ResolveTag, Tag, TagContext};

pub use resolve::{Externals, TagResolver};

pub use runtime::{Applier, DryRunApplier, OnError, ReconcileReport, Reconciler, ResolvedEntry};

pub use codec::{dump, dump_value, load_file, load_str};

pub use store::{EntityStore, EnvSource, MapEnv, MemoryStore, ProcessEnv, Query};

pub use event::{Event, EventKind, EventLog};

pub use export::{FieldSpec, SerializerModel};
