//! Utilities Module - shared infrastructure
//!
//! Contains helpers used across the codebase:
//! - `constants`: Centralized names and limits
//! - `value`: Truthiness and text rendering of resolved values

pub mod constants;
pub mod value;

// Re-export public helpers
pub use constants::{DEFAULT_STATE, POLICY_BINDING_MODEL, SUPPORTED_VERSION};
pub use value::{display_str, is_truthy, repr_str, type_name};
