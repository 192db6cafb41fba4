//! Store Module - external collaborators of the resolver
//!
//! The resolver never talks to a database directly. It goes through:
//! - `EntityStore`: "first match of model X under a conjunctive filter"
//! - `EnvSource`: environment variable reads
//!
//! Key types:
//! - `Query`: model name + ordered `(field, value)` filters
//! - `MemoryStore`: DashMap-backed reference store (tests, dry runs)
//! - `ProcessEnv` / `MapEnv`: real and fixed environments

mod env;
mod memory;

use serde_json::Value;

use crate::error::EntryInvalid;

// Re-export all public types
pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use memory::{MemoryStore, Record};

/// Conjunctive (AND) filter against one model
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub model: String,
    pub filters: Vec<(String, Value)>,
}

impl Query {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            filters: Vec::new(),
        }
    }

    /// Add one `field == value` condition
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Query capability used by `!Find`
pub trait EntityStore: Send + Sync {
    /// Primary key of the first object matching `query`, or `None`
    fn first_pk(&self, query: &Query) -> Result<Option<Value>, EntryInvalid>;
}
