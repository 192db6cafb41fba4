//! Event Module - audit trail of a reconcile run
//!
//! - `log`: `Event`, `EventKind` and the append-only `EventLog`

mod log;

pub use log::{Event, EventKind, EventLog};
