//! Error types for the building registry.
//!
//! All errors are strongly typed using thiserror. Field-level problems are
//! never errors: they degrade the field to absent and are reported in the
//! run report instead (see [`crate::report::FieldDegradation`]).

use thiserror::Error;

use crate::source::SourceRecordId;

/// Record-level validation errors.
///
/// A raw record that fails one of these checks is structurally unparseable
/// and is rejected from the run. Rejection is reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ValidationError {
    #[error("Raw record is not a field map (found {found})")]
    NotAnObject {
        found: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' has an unreadable value: {reason}")]
    UnreadableField {
        field: String,
        reason: String,
    },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    FieldTooLong {
        field: String,
        max_length: usize,
    },
}

/// Configuration errors detected before a run starts.
#[derive(Debug, Clone, PartialEq, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("Invalid bounding box: {reason}")]
    InvalidBounds {
        reason: String,
    },

    #[error("Invalid threshold '{name}': {value} ({reason})")]
    InvalidThreshold {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("Invalid year range: min ({min}) must not exceed max ({max})")]
    InvalidYearRange {
        min: i32,
        max: i32,
    },

    #[error("Invalid parcel format: {reason}")]
    InvalidParcelFormat {
        reason: String,
    },

    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Failed to read configuration: {message}")]
    Unreadable {
        message: String,
    },
}

/// Errors raised while synthesizing canonical records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum MergeError {
    #[error("Ambiguous merge: source '{source_name}' supplies id '{source_id}' more than once")]
    AmbiguousMerge {
        source_name: String,
        source_id: String,
    },

    #[error("Cluster has no members")]
    EmptyCluster,

    #[error("Cluster references record index {index} but only {len} records exist")]
    DanglingMember {
        index: usize,
        len: usize,
    },
}

impl MergeError {
    /// Builds an ambiguous-merge error for a colliding record identifier.
    #[must_use]
    pub fn ambiguous(id: &SourceRecordId) -> Self {
        Self::AmbiguousMerge {
            source_name: id.source_name.to_string(),
            source_id: id.source_id.clone(),
        }
    }
}

/// Top-level error type for registry runs.
///
/// A run either completes with a full registry or aborts with one of these.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl RegistryError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a merge error.
    #[must_use]
    pub const fn is_merge(&self) -> bool {
        matches!(self, Self::Merge(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
