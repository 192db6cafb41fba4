//! Entry - one unit of desired state
//!
//! Every field except `id` may hold tags; resolving them is done through the
//! accessors in the `resolve` module (`Entry::get_attrs` and friends).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EntryInvalid;
use crate::util::DEFAULT_STATE;

use super::node::Node;

/// State an entry should be reconciled to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Absent,
    #[default]
    Present,
    Created,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredState::Absent => "absent",
            DesiredState::Present => "present",
            DesiredState::Created => "created",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesiredState {
    type Err = EntryInvalid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absent" => Ok(DesiredState::Absent),
            "present" => Ok(DesiredState::Present),
            "created" => Ok(DesiredState::Created),
            other => Err(EntryInvalid::new(format!(
                "'{}' is not a valid state (expected absent, present or created)",
                other
            ))),
        }
    }
}

/// Object bound to an entry after the reconciler applied it
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Model the instance belongs to
    pub model: String,
    /// Primary key
    pub pk: Value,
    /// Alternate key of policy-binding-model instances
    pub binding_key: Option<Value>,
}

impl Instance {
    pub fn new(model: impl Into<String>, pk: impl Into<Value>) -> Self {
        Self {
            model: model.into(),
            pk: pk.into(),
            binding_key: None,
        }
    }

    /// Mark this instance as a policy-binding model with the given binding key
    pub fn with_binding_key(mut self, key: impl Into<Value>) -> Self {
        self.binding_key = Some(key.into());
        self
    }

    pub fn is_policy_binding_model(&self) -> bool {
        self.binding_key.is_some()
    }
}

/// Single entry of a blueprint
#[derive(Debug, Clone)]
pub struct Entry {
    /// Target model (`app_label.model_name`), string or tag
    pub model: Node,
    /// Desired state, string or tag
    pub state: Node,
    /// Guards, all of which must be truthy for the entry to apply
    pub conditions: Vec<Node>,
    pub identifiers: Node,
    pub attrs: Node,
    /// Stable label other entries reference with `!KeyOf`
    pub id: Option<String>,
    instance: OnceLock<Instance>,
}

impl Entry {
    pub fn new(model: impl Into<Node>) -> Self {
        Self {
            model: model.into(),
            state: Node::from(DEFAULT_STATE),
            conditions: Vec::new(),
            identifiers: Node::empty_map(),
            attrs: Node::empty_map(),
            id: None,
            instance: OnceLock::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<Node>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<Node>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn with_identifiers(mut self, identifiers: impl Into<Node>) -> Self {
        self.identifiers = identifiers.into();
        self
    }

    pub fn with_attrs(mut self, attrs: impl Into<Node>) -> Self {
        self.attrs = attrs.into();
        self
    }

    /// Materialized instance, once the reconciler has applied this entry
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.get()
    }

    /// Record the materialized instance.
    ///
    /// The slot is write-once: a second call returns the rejected instance.
    pub fn set_instance(&self, instance: Instance) -> Result<(), Instance> {
        self.instance.set(instance)
    }

    pub fn is_materialized(&self) -> bool {
        self.instance.get().is_some()
    }
}
