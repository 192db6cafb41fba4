//! Codec Module - YAML in, YAML out
//!
//! - `loader`: YAML text → [`Document`] with tags constructed
//! - `dumper`: [`Document`] / resolved values → YAML text
//!
//! Tags use YAML local tag syntax (`!KeyOf admins`). Anchors and aliases are
//! expanded by value while parsing, so every tag occurrence is its own object.

mod dumper;
mod loader;

pub use dumper::{dump, dump_value, to_yaml};
pub use loader::{load_file, load_str};
