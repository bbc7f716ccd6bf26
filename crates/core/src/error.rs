//! Error type shared by the library store, source registry and launch planner.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::source::SourceKind;

/// Errors surfaced by library operations.
///
/// Identity and package errors block the corresponding user action and are
/// always returned to the caller.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A source could not derive a game id because its identity field is empty.
    #[error("{kind} game has no {field}; cannot derive a game id")]
    InvalidIdentity {
        /// Source whose rule failed.
        kind: SourceKind,
        /// Field the rule depends on.
        field: &'static str,
    },

    /// A package-only operation was invoked on a regular game.
    #[error("{0} is not a package")]
    NotAPackage(String),

    /// No game is stored under the given id.
    #[error("game not found: {0}")]
    NotFound(String),

    /// Launch planning requires an install path the game does not have.
    #[error("{0} has no install path")]
    MissingPath(String),

    /// A persisted or user-supplied field value has the wrong shape.
    #[error("invalid value for {field}: {reason}")]
    InvalidField {
        /// Persisted field name.
        field: &'static str,
        /// Human readable explanation.
        reason: String,
    },

    /// A shell link could not be read.
    #[error("failed to read shortcut {}: {reason}", path.display())]
    Shortcut {
        /// Path of the `.lnk` file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Moving a staged snapshot into place failed.
    #[error("failed to persist {}: {source}", path.display())]
    Persist {
        /// Destination that was left untouched.
        path: PathBuf,
        /// Underlying rename error.
        #[source]
        source: io::Error,
    },
}

impl LibraryError {
    pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience alias for library results.
pub type Result<T, E = LibraryError> = std::result::Result<T, E>;
