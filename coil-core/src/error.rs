//! The closed taxonomy of errors the core can raise.
//!
//! Every variant carries a [`Location`]; struct-level variants additionally
//! carry the absolute path of the node involved. Evaluation is all-or-nothing:
//! any error here aborts the whole `parse`/`parse_file` call (the
//! `defaults`/`ignore_missing` expansion options downgrade what would
//! otherwise be `KeyMissing` into a successful substitution, see
//! [`crate::expand`]).

use crate::location::Location;
use thiserror::Error;

/// Errors produced while tokenizing, parsing or expanding a coil document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoilError {
    /// Unrecognized input, an unterminated string, or a decode failure.
    #[error("{location}: lexical error: {reason}")]
    Lexical { location: Location, reason: String },

    /// The token stream didn't match the grammar.
    #[error("{location}: syntax error: {reason}")]
    Syntax { location: Location, reason: String },

    /// Invalid/duplicate/deleted key, bad `@extends` target, type mismatch
    /// on `@extends`/`@file`, double-add or double-delete.
    #[error("{location}: {path}: {reason}")]
    Data {
        location: Location,
        path: String,
        reason: String,
    },

    /// A cycle was detected while expanding links or string interpolation.
    #[error("{location}: {path}: circular reference")]
    Circular { location: Location, path: String },

    /// A path lookup found no such key.
    #[error("{location}: key not found: {key}")]
    KeyMissing { location: Location, key: String },

    /// A path was used where a string was expected (or vice versa).
    #[error("{location}: invalid key type: {reason}")]
    KeyType { location: Location, reason: String },

    /// A path literal was syntactically invalid (e.g. mid-path `..`).
    #[error("{location}: invalid key: {key}")]
    KeyValue { location: Location, key: String },

    /// A path resolved to a value of the wrong kind (e.g. indexing through
    /// a leaf, or `@extends` onto a non-struct).
    #[error("{location}: {path}: expected {expected}, found {found}")]
    ValueType {
        location: Location,
        path: String,
        expected: String,
        found: String,
    },

    /// Opening or reading a file failed during `@file`/`@package`.
    #[error("{location}: I/O error: {reason}")]
    Io { location: Location, reason: String },

    /// Decoding bytes under a declared encoding failed.
    #[error("{location}: unicode error: {reason}")]
    Unicode { location: Location, reason: String },
}

impl CoilError {
    /// The location at which this error was raised.
    pub fn location(&self) -> &Location {
        match self {
            CoilError::Lexical { location, .. }
            | CoilError::Syntax { location, .. }
            | CoilError::Data { location, .. }
            | CoilError::Circular { location, .. }
            | CoilError::KeyMissing { location, .. }
            | CoilError::KeyType { location, .. }
            | CoilError::KeyValue { location, .. }
            | CoilError::ValueType { location, .. }
            | CoilError::Io { location, .. }
            | CoilError::Unicode { location, .. } => location,
        }
    }

    pub(crate) fn syntax(location: Location, reason: impl Into<String>) -> Self {
        CoilError::Syntax {
            location,
            reason: reason.into(),
        }
    }

    pub(crate) fn lexical(location: Location, reason: impl Into<String>) -> Self {
        CoilError::Lexical {
            location,
            reason: reason.into(),
        }
    }

    pub(crate) fn data(location: Location, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CoilError::Data {
            location,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn key_missing(location: Location, key: impl Into<String>) -> Self {
        CoilError::KeyMissing {
            location,
            key: key.into(),
        }
    }

    pub(crate) fn key_value(location: Location, key: impl Into<String>) -> Self {
        CoilError::KeyValue {
            location,
            key: key.into(),
        }
    }

    pub(crate) fn value_type(
        location: Location,
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        CoilError::ValueType {
            location,
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn circular(location: Location, path: impl Into<String>) -> Self {
        CoilError::Circular {
            location,
            path: path.into(),
        }
    }

    pub(crate) fn io(location: Location, reason: impl Into<String>) -> Self {
        CoilError::Io {
            location,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoilError>;
