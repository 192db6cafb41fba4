// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Blueprint Error Types with Error Codes
//!
//! Error code ranges:
//! - BP-000-009: Document errors
//! - BP-010-019: Tag syntax errors
//! - BP-040-049: Entry resolution errors
//! - BP-050-059: Reconcile errors
//! - BP-090-099: Config/IO errors
//!
//! Tags and the resolver only ever produce [`EntryInvalid`]. Everything that
//! happens around them (loading, config, the reconcile loop) uses
//! [`BlueprintError`].

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlueprintError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// The single error kind raised while resolving an entry.
///
/// `serializer_errors` carries structured validation detail when the error
/// comes from a failed apply rather than from tag resolution.
#[derive(Error, Debug, Clone, PartialEq, Diagnostic)]
#[error("[BP-040] Entry invalid: {reason}")]
#[diagnostic(
    code(blueprint::entry_invalid),
    help("Check the tags used by this entry and the entries it references")
)]
pub struct EntryInvalid {
    pub reason: String,
    pub serializer_errors: Option<Value>,
}

impl EntryInvalid {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            serializer_errors: None,
        }
    }

    /// Attach structured validation detail (e.g. field errors from an apply)
    pub fn with_serializer_errors(mut self, errors: Value) -> Self {
        self.serializer_errors = Some(errors);
        self
    }
}

/// Crate-level error type.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
pub enum BlueprintError {
    // ═══════════════════════════════════════════
    // DOCUMENT ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[BP-001] Failed to parse blueprint: {details}")]
    #[diagnostic(
        code(blueprint::parse_error),
        help("Check YAML syntax: indentation and quoting")
    )]
    ParseError { details: String },

    #[error("[BP-002] Invalid blueprint document: {reason}")]
    #[diagnostic(
        code(blueprint::invalid_document),
        help("A blueprint needs `version` and a list of `entries`")
    )]
    InvalidDocument { reason: String },

    #[error("[BP-003] Unsupported blueprint version: {version}")]
    #[diagnostic(code(blueprint::unsupported_version), help("Use `version: 1`"))]
    UnsupportedVersion { version: i64 },

    // ═══════════════════════════════════════════
    // TAG SYNTAX ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[BP-010] Malformed !{tag} tag: {reason}")]
    #[diagnostic(code(blueprint::tag_syntax))]
    TagSyntax { tag: String, reason: String },

    #[error("[BP-011] Unknown tag '!{tag}'")]
    #[diagnostic(code(blueprint::unknown_tag))]
    UnknownTag { tag: String },

    // ═══════════════════════════════════════════
    // ENTRY ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error(transparent)]
    #[diagnostic(transparent)]
    EntryInvalid(#[from] EntryInvalid),

    // ═══════════════════════════════════════════
    // RECONCILE ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[BP-050] Entry #{index}{} failed: {source}", id_suffix(.id))]
    #[diagnostic(code(blueprint::entry_failed))]
    EntryFailed {
        index: usize,
        id: Option<String>,
        #[source]
        source: EntryInvalid,
    },

    #[error("[BP-051] Entry #{index} already has a materialized instance")]
    #[diagnostic(code(blueprint::already_materialized))]
    AlreadyMaterialized { index: usize },

    // ═══════════════════════════════════════════
    // CONFIG / IO ERRORS (090-099)
    // ═══════════════════════════════════════════
    #[error("[BP-090] Configuration error: {reason}")]
    #[diagnostic(code(blueprint::config_error))]
    ConfigError { reason: String },

    #[error("[BP-091] IO error: {0}")]
    #[diagnostic(code(blueprint::io_error))]
    Io(#[from] std::io::Error),

    #[error("[BP-092] Failed to serialize: {details}")]
    #[diagnostic(code(blueprint::dump_error))]
    DumpError { details: String },
}

fn id_suffix(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" (id '{}')", id),
        None => String::new(),
    }
}

impl From<serde_yaml::Error> for BlueprintError {
    fn from(e: serde_yaml::Error) -> Self {
        BlueprintError::ParseError {
            details: e.to_string(),
        }
    }
}

impl BlueprintError {
    pub fn tag_syntax(tag: &str, reason: impl Into<String>) -> Self {
        BlueprintError::TagSyntax {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }

    /// Error code, e.g. "BP-040"
    pub fn code(&self) -> &'static str {
        match self {
            BlueprintError::ParseError { .. } => "BP-001",
            BlueprintError::InvalidDocument { .. } => "BP-002",
            BlueprintError::UnsupportedVersion { .. } => "BP-003",
            BlueprintError::TagSyntax { .. } => "BP-010",
            BlueprintError::UnknownTag { .. } => "BP-011",
            BlueprintError::EntryInvalid(_) => "BP-040",
            BlueprintError::EntryFailed { .. } => "BP-050",
            BlueprintError::AlreadyMaterialized { .. } => "BP-051",
            BlueprintError::ConfigError { .. } => "BP-090",
            BlueprintError::Io(_) => "BP-091",
            BlueprintError::DumpError { .. } => "BP-092",
        }
    }
}

impl FixSuggestion for BlueprintError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BlueprintError::ParseError { .. } => Some("Check YAML syntax: indentation and quoting"),
            BlueprintError::InvalidDocument { .. } => {
                Some("Each entry needs a `model`; `identifiers` and `attrs` must be mappings")
            }
            BlueprintError::UnsupportedVersion { .. } => Some("Set `version: 1`"),
            BlueprintError::TagSyntax { .. } => {
                Some("Check the tag arguments, e.g. !Format [\"%s\", value] or !ForItem 0")
            }
            BlueprintError::UnknownTag { .. } => Some(
                "Supported tags: !KeyOf !Env !Context !Format !Find !Condition !If !For !ForItem !ForItemIndex",
            ),
            BlueprintError::EntryInvalid(_) | BlueprintError::EntryFailed { .. } => {
                Some("Entries referenced with !KeyOf must be declared (and applied) earlier")
            }
            BlueprintError::AlreadyMaterialized { .. } => {
                Some("Load the blueprint again before reconciling it a second time")
            }
            BlueprintError::ConfigError { .. } => Some("Check ~/.config/blueprint/config.toml"),
            BlueprintError::Io(_) => Some("Check file path and permissions"),
            BlueprintError::DumpError { .. } => None,
        }
    }
}
