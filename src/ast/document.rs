//! Document - a full blueprint
//!
//! Entry order is meaningful: `!KeyOf` can only see entries declared (and
//! applied) before the one being resolved.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{BlueprintError, Result};
use crate::util::SUPPORTED_VERSION;

use super::entry::Entry;

/// Optional blueprint metadata (inert to resolution)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub version: i64,
    pub entries: Vec<Entry>,
    /// Caller-supplied values read by `!Context`
    pub context: Map<String, Value>,
    pub metadata: Option<Metadata>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            entries: Vec::new(),
            context: Map::new(),
            metadata: None,
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// First entry declared with the given `id`
    pub fn entry_by_id(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id.as_deref() == Some(id))
    }

    /// Overlay caller-supplied context; caller values win
    pub fn merge_context(&mut self, context: Map<String, Value>) {
        for (key, value) in context {
            self.context.insert(key, value);
        }
    }

    /// Fill in context keys the document does not define
    pub fn context_defaults(&mut self, defaults: &Map<String, Value>) {
        for (key, value) in defaults {
            if !self.context.contains_key(key) {
                self.context.insert(key.clone(), value.clone());
            }
        }
    }

    /// Check the document is something the resolver can work with
    pub fn validate(&self) -> Result<()> {
        if self.version != SUPPORTED_VERSION {
            return Err(BlueprintError::UnsupportedVersion {
                version: self.version,
            });
        }

        // Repeated ids are alternates; `!KeyOf` takes the first one applied
        let mut seen = FxHashSet::default();
        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(id) = &entry.id {
                if !seen.insert(id.as_str()) && entry.conditions.is_empty() {
                    warn!(index, id = %id, "entry id repeated without conditions");
                }
            }
        }

        Ok(())
    }
}
