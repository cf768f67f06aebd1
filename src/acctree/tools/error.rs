use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering failures that abort an operation outright: I/O,
/// the snapshot and commit collaborators, and CLI setup.
///
/// Problems found inside the input file are never reported through this type;
/// they are collected as [`Diagnostic`]s on the load result instead.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when the snapshot provider cannot produce the live state.
    #[error("snapshot fetch failed for cluster {cluster}: {reason}")]
    Snapshot { cluster: String, reason: String },

    /// Raised by a commit sink when it fails to persist an item.
    #[error("commit failed for {key}: {reason}")]
    Commit { key: String, reason: String },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when a dump is requested for a cluster the store does not know.
    #[error("unknown cluster: {0}")]
    UnknownCluster(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Problems detected while reading a load file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Malformed line or field: bad quoting, missing name, missing `=`.
    #[error("malformed line: {reason}")]
    LineFormat { reason: String },

    /// A key the entity kind does not recognise. The field is skipped.
    #[error("unknown option '{key}' for {kind}")]
    UnknownKey { kind: String, key: String },

    /// A `Parent` declaration naming an organization nobody has seen.
    #[error("parent '{parent}' does not exist and was not declared earlier in the file")]
    UnresolvedParent { parent: String },

    /// An account placed below one of its own descendants.
    #[error("placing '{organization}' under '{parent}' would create a cycle")]
    ParentCycle {
        organization: String,
        parent: String,
    },

    /// A numeric or duration literal that could not be interpreted.
    #[error("invalid value '{value}' for {key}: {reason}")]
    ValueCoercion {
        key: String,
        value: String,
        reason: String,
    },

    /// A declaration appeared before any cluster was known.
    #[error("no cluster declared before first {kind} line")]
    MissingCluster { kind: String },

    /// A second `Cluster` declaration naming a different cluster.
    #[error("cluster '{declared}' conflicts with '{current}' already being loaded")]
    ClusterConflict { current: String, declared: String },
}

impl ParseError {
    pub(crate) fn line_format(reason: impl Into<String>) -> Self {
        ParseError::LineFormat {
            reason: reason.into(),
        }
    }

    /// Whether line consumption must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParseError::UnresolvedParent { .. }
                | ParseError::MissingCluster { .. }
                | ParseError::ClusterConflict { .. }
        )
    }
}

/// A [`ParseError`] tagged with the physical line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub error: ParseError,
}

impl Diagnostic {
    pub fn new(line: usize, error: ParseError) -> Self {
        Self { line, error }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}
