//! Tag Module - deferred computations embedded in a blueprint
//!
//! Every tag is built once at load time and resolved on demand, any number of
//! times, through a [`TagResolver`]. Resolution only ever fails with
//! [`EntryInvalid`].
//!
//! ```text
//! !KeyOf id                  → pk of an earlier, applied entry
//! !Env KEY | [KEY, default]  → environment variable
//! !Context key | [key, def]  → document context value
//! !Format [fmt, args...]     → printf-style string
//! !Find [model, [k, v]...]   → pk of the first matching stored object
//! !Condition [MODE, args...] → boolean combination of truthiness
//! !If [cond, then, else]     → one branch, the other is never resolved
//! !For [iterable, body]      → body resolved once per item
//! !ForItem n / !ForItemIndex n → item / index of the n-th enclosing loop
//! ```

mod format;
mod iter;
mod logic;
mod lookup;

pub use format::{format_values, Format};
pub use iter::{For, ForItem, ForItemIndex};
pub use logic::{Condition, ConditionMode, If};
pub use lookup::{Context, Env, Find, KeyOf};

use serde_json::Value;

use crate::error::EntryInvalid;
use crate::resolve::{ContextId, ContextKind, TagResolver};

/// Resolution contract shared by every tag
pub trait ResolveTag {
    fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid>;
}

/// Tags that provide a scoped value to accessor tags below them
pub trait TagContext {
    fn context_kind(&self) -> ContextKind;

    /// Identity of this tag for the duration of a resolution call
    fn context_id(&self) -> ContextId {
        ContextId::of(self)
    }
}

/// Closed set of supported tags
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    KeyOf(KeyOf),
    Env(Env),
    Context(Context),
    Format(Format),
    Find(Find),
    Condition(Condition),
    If(If),
    For(For),
    ForItem(ForItem),
    ForItemIndex(ForItemIndex),
}

impl Tag {
    /// YAML tag name, without the leading `!`
    pub fn name(&self) -> &'static str {
        match self {
            Tag::KeyOf(_) => "KeyOf",
            Tag::Env(_) => "Env",
            Tag::Context(_) => "Context",
            Tag::Format(_) => "Format",
            Tag::Find(_) => "Find",
            Tag::Condition(_) => "Condition",
            Tag::If(_) => "If",
            Tag::For(_) => "For",
            Tag::ForItem(_) => "ForItem",
            Tag::ForItemIndex(_) => "ForItemIndex",
        }
    }

    /// Context behaviour of this tag, if it has one
    pub fn as_context(&self) -> Option<&dyn TagContext> {
        match self {
            Tag::For(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn resolve(&self, resolver: &mut TagResolver<'_>) -> Result<Value, EntryInvalid> {
        match self {
            Tag::KeyOf(tag) => tag.resolve(resolver),
            Tag::Env(tag) => tag.resolve(resolver),
            Tag::Context(tag) => tag.resolve(resolver),
            Tag::Format(tag) => tag.resolve(resolver),
            Tag::Find(tag) => tag.resolve(resolver),
            Tag::Condition(tag) => tag.resolve(resolver),
            Tag::If(tag) => tag.resolve(resolver),
            Tag::For(tag) => tag.resolve(resolver),
            Tag::ForItem(tag) => tag.resolve(resolver),
            Tag::ForItemIndex(tag) => tag.resolve(resolver),
        }
    }
}

macro_rules! impl_from_tag {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Tag {
                fn from(tag: $variant) -> Self {
                    Tag::$variant(tag)
                }
            }
        )*
    };
}

impl_from_tag!(KeyOf, Env, Context, Format, Find, Condition, If, For, ForItem, ForItemIndex);
