//! Error taxonomy shared by every layer of the engine.
//!
//! Only [`Error::SourceUnavailable`] is recoverable: the tick driver isolates it
//! per slot. Everything else is either a construction-time failure that aborts
//! configuration loading, or a caller bug ([`Error::IndexOutOfRange`]).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The OS object behind a raw source disappeared or cannot be read.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    /// A counter path string does not have the `\\machine\category(instance)\counter` shape.
    #[error("malformed counter path '{path}': {reason}")]
    MalformedCounterPath { path: String, reason: &'static str },
    /// `at(index)` was called with `index >= count()`.
    #[error("history index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },
    /// A configuration entry names a kind or predefined value that does not exist.
    #[error("unknown configuration kind '{kind}' (value '{value}')")]
    UnknownConfigurationKind { kind: String, value: String },
    /// A predefined recipe needs an instance the catalog does not expose.
    #[error("category '{category}' has no instance '{instance}'")]
    MissingInstance { category: String, instance: String },
    /// A predefined kind that owns a rebuildable slot set appears twice in a layout.
    #[error("layout lists predefined '{0}' more than once")]
    DuplicateSlot(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a tick driver may skip this error and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }

    pub(crate) fn unavailable(what: impl Into<String>) -> Self {
        Self::SourceUnavailable(what.into())
    }
}
