//! Centralized constants for blueprint loading and resolution

// ═══════════════════════════════════════════════════════════════
// Document
// ═══════════════════════════════════════════════════════════════

/// The only blueprint document version understood by the loader
pub const SUPPORTED_VERSION: i64 = 1;

/// Desired state used when an entry omits `state:`
pub const DEFAULT_STATE: &str = "present";

// ═══════════════════════════════════════════════════════════════
// Models
// ═══════════════════════════════════════════════════════════════

/// Association model whose `!KeyOf` references resolve to the binding key
/// of a policy-binding-model instance instead of its primary key
pub const POLICY_BINDING_MODEL: &str = "authentik_policies.policybinding";

/// Field-name suffix of reverse (many) relations, dropped on export
pub const REVERSE_RELATION_SUFFIX: &str = "_set";

// ═══════════════════════════════════════════════════════════════
// Environment
// ═══════════════════════════════════════════════════════════════

/// Overrides `defaults.on_error` from the config file
pub const ON_ERROR_ENV: &str = "BLUEPRINT_ON_ERROR";

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
