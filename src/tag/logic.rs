//! Logic tags - `!Condition` and `!If`

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::ResolveTag;
use crate::ast::Node;
use crate::error::EntryInvalid;
use crate::resolve::TagResolver;
use crate::util::is_truthy;

/// Boolean combinator of a `!Condition`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionMode {
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Xnor,
}

impl ConditionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionMode::And => "AND",
            ConditionMode::Nand => "NAND",
            ConditionMode::Or => "OR",
            ConditionMode::Nor => "NOR",
            ConditionMode::Xor => "XOR",
            ConditionMode::Xnor => "XNOR",
        }
    }

    /// Combine truth values; `args` must not be empty
    pub fn apply(&self, args: &[bool]) -> bool {
        let xor = || args.iter().fold(false, |acc, &b| acc ^ b);
        match self {
            ConditionMode::And => args.iter().all(|&b| b),
            ConditionMode::Nand => !args.iter().all(|&b| b),
            ConditionMode::Or => args.iter().any(|&b| b),
            ConditionMode::Nor => !args.iter().any(|&b| b),
            ConditionMode::Xor => xor(),
            ConditionMode::Xnor => !xor(),
        }
    }
}

impl fmt::Display for ConditionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionMode {
    type Err = EntryInvalid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(ConditionMode::And),
            "NAND" => Ok(ConditionMode::Nand),
            "OR" => Ok(ConditionMode::Or),
            "NOR" => Ok(ConditionMode::Nor),
            "XOR" => Ok(ConditionMode::Xor),
            "XNOR" => Ok(ConditionMode::Xnor),
            _ => Err(EntryInvalid::new(format!("Condition: unknown mode '{}'", s))),
        }
    }
}

/// Reduce arguments to a single boolean
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Mode as written; checked when the tag is resolved
    pub mode: String,
    pub args: Vec<Node>,
}

impl Condition {
    pub fn new(mode: impl Into<String>, args: Vec<Node>) -> Self {
        Self {
            mode: mode.into(),
            args,
        }
    }
}

impl ResolveTag for Condition {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        let args = self
            .args
            .iter()
            .map(|arg| resolver.resolve(arg).map(|v| is_truthy(&v)))
            .collect::<Result<Vec<_>, _>>()?;

        if args.is_empty() {
            return Err(EntryInvalid::new(
                "At least one value is required after mode selection.",
            ));
        }

        let mode: ConditionMode = self.mode.parse()?;
        Ok(Value::Bool(mode.apply(&args)))
    }
}

/// Pick one of two branches
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: Node,
    pub when_true: Node,
    pub when_false: Node,
}

impl If {
    pub fn new(
        condition: impl Into<Node>,
        when_true: impl Into<Node>,
        when_false: impl Into<Node>,
    ) -> Self {
        Self {
            condition: condition.into(),
            when_true: when_true.into(),
            when_false: when_false.into(),
        }
    }
}

impl ResolveTag for If {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        let condition = resolver.resolve(&self.condition)?;
        let branch = if is_truthy(&condition) {
            &self.when_true
        } else {
            &self.when_false
        };
        resolver.resolve(branch)
    }
}
