//! AST Module - document model for YAML blueprints
//!
//! Contains the Rust types a blueprint decodes into:
//! - `node`: Node (value tree that may embed tags)
//! - `entry`: Entry, DesiredState, Instance
//! - `document`: Document, Metadata
//!
//! These types represent the "what" - declared structure parsed from YAML.
//! Turning them into concrete values is the job of the `resolve` module.

mod document;
mod entry;
mod node;

// Re-export all public types
pub use document::{Document, Metadata};
pub use entry::{DesiredState, Entry, Instance};
pub use node::Node;
