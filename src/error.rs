//! Error types for the schema control engine.
//!
//! This module provides the error hierarchy for every stage of a planning
//! run: configuration, DDL normalization, live-state lookups, and plan
//! construction.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the schema control engine.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dialect errors raised while normalizing DDL.
    #[error("Dialect error: {0}")]
    Dialect(#[from] DialectError),

    /// Live-state or change-log lookup errors.
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Plan construction errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration or definition file was not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A configuration or definition file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The dialect version string could not be parsed.
    #[error("Invalid dialect version '{version}': expected MAJOR[.MINOR[.PATCH]]")]
    InvalidDialect {
        /// The rejected version string.
        version: String,
    },

    /// Two definitions claim the same identity.
    #[error("Duplicate {kind} definition: {name}")]
    DuplicateDefinition {
        /// Kind of definition (resource or change).
        kind: String,
        /// The duplicated identity.
        name: String,
    },

    /// A resource definition's SQL does not start with a recognizable CREATE statement.
    #[error("Cannot determine resource type and name from {path}: {message}")]
    UnrecognizedResource {
        /// File the resource was loaded from.
        path: PathBuf,
        /// Why extraction failed.
        message: String,
    },

    /// Definition list files include each other.
    #[error("Circular definition include detected: {cycle}")]
    CircularInclude {
        /// Description of the cycle.
        cycle: String,
    },

    /// Environment variable is missing or malformed.
    #[error("Missing or invalid environment variable: {name}")]
    MissingEnvVar {
        /// Name of the variable.
        name: String,
    },
}

/// Errors raised by dialect adapters.
#[derive(Debug, Error)]
pub enum DialectError {
    /// Normalization was requested for a combination the adapter does not handle.
    #[error("{resource_type} definitions are not supported for {language} {dialect}")]
    Unsupported {
        /// Database language.
        language: String,
        /// Object type that was requested.
        resource_type: String,
        /// Dialect version in effect.
        dialect: String,
    },
}

/// Errors raised by the live-state collaborator.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Retrieving the live definition of an object failed.
    #[error("Failed to query live definition of {object}: {message}")]
    LiveState {
        /// Object that was queried (e.g. "table users").
        object: String,
        /// Description of the failure.
        message: String,
    },

    /// Retrieving a change-log entry failed.
    #[error("Failed to query change log for '{id}': {message}")]
    ChangeLog {
        /// Change id that was queried.
        id: String,
        /// Description of the failure.
        message: String,
    },

    /// A live-state snapshot could not be read.
    #[error("Failed to load live-state snapshot {path}: {message}")]
    Snapshot {
        /// Path of the snapshot file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
}

/// Plan construction errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The plan id and the status belong to different definition kinds.
    #[error("Plan '{id}' cannot carry {kind} status {status}")]
    KindMismatch {
        /// Plan id.
        id: String,
        /// Kind the status belongs to.
        kind: String,
        /// The offending status.
        status: String,
    },

    /// A difference was given without a mismatch, or omitted for a mismatch.
    #[error("Plan '{id}' with status {status} {message}")]
    DifferenceInvariant {
        /// Plan id.
        id: String,
        /// Status of the plan.
        status: String,
        /// What was wrong.
        message: String,
    },
}

/// Result type alias for schema control operations.
pub type Result<T> = std::result::Result<T, ControlError>;

impl ControlError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error came from a normalization request the
    /// active dialect cannot serve.
    #[must_use]
    pub const fn is_unsupported_dialect(&self) -> bool {
        matches!(self, Self::Dialect(DialectError::Unsupported { .. }))
    }

    /// Returns true if this error came from the live-state collaborator.
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error tied to a file.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

impl LookupError {
    /// Creates a live-state lookup error.
    #[must_use]
    pub fn live_state(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LiveState {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Creates a change-log lookup error.
    #[must_use]
    pub fn change_log(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChangeLog {
            id: id.into(),
            message: message.into(),
        }
    }
}
