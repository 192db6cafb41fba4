//! Runtime Module - applying a blueprint, entry by entry
//!
//! Contains the components that drive resolution:
//! - `reconcile`: sequential reconcile loop with an error policy
//! - `apply`: the `Applier` seam and a dry-run implementation
//!
//! This module represents the "how" - runtime execution.
//! For static structure, see the `ast` module.

mod apply;
mod reconcile;

// Re-export public types
pub use apply::{Applier, DryRunApplier};
pub use reconcile::{FailedEntry, OnError, ReconcileReport, Reconciler, ResolvedEntry};
