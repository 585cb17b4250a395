//! Error types for the validation core.
//!
//! Field-level failures are collected into a [`ValidationError`] so a caller
//! receives one report per record listing every field that failed and why.

use thiserror::Error;

use crate::types::RecordKind;

/// Failure produced by the flexible date parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    /// No accepted format matched the string.
    #[error("invalid date format: '{value}'. Accepted formats: {}", .accepted.join(", "))]
    Format {
        value: String,
        accepted: Vec<&'static str>,
    },

    /// A date was recognised but its year falls outside the accepted range.
    #[error("year {year} out of range, must be between {min} and {max}")]
    Range { year: i32, min: i32, max: i32 },

    /// The raw value is neither a date string nor null.
    #[error("invalid type for date: expected string, got {found}")]
    Type { found: &'static str },
}

/// What went wrong with a single field or composite.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldErrorKind {
    #[error("missing required field")]
    MissingField,

    #[error("invalid date format: '{value}'. Accepted formats: {}", .accepted.join(", "))]
    DateFormat {
        value: String,
        accepted: Vec<&'static str>,
    },

    #[error("year {year} out of range, must be between {min} and {max}")]
    DateRange { year: i32, min: i32, max: i32 },

    #[error("invalid type for date: expected string, got {found}")]
    DateType { found: &'static str },

    #[error("invalid type: expected {expected}, got {found}")]
    InvalidType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    #[error("no distributor known for CUPS '{cups}' and none was declared")]
    UnknownDistributor { cups: String },

    #[error("inconsistent record: {reason}")]
    InconsistentRecord { reason: String },
}

impl From<DateError> for FieldErrorKind {
    fn from(err: DateError) -> Self {
        match err {
            DateError::Format { value, accepted } => Self::DateFormat { value, accepted },
            DateError::Range { year, min, max } => Self::DateRange { year, min, max },
            DateError::Type { found } => Self::DateType { found },
        }
    }
}

/// A failure attached to a dotted field path such as `supply_point.cups`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {kind}", display_path(.path))]
pub struct FieldError {
    pub path: String,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(path: impl Into<String>, kind: FieldErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// The last segment of the path, i.e. the field's own name.
    pub fn field(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.kind, FieldErrorKind::MissingField)
    }
}

/// Aggregated rejection of one record.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{record} validation failed with {} error(s){}", .errors.len(), list_errors(.errors))]
pub struct ValidationError {
    pub record: RecordKind,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(record: RecordKind, errors: Vec<FieldError>) -> Self {
        Self { record, errors }
    }

    /// Find the first error reported for a field name (last path segment).
    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field() == field)
    }

    /// Find the first error reported at an exact dotted path.
    pub fn at_path(&self, path: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.path == path)
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

fn list_errors(errors: &[FieldError]) -> String {
    errors.iter().map(|e| format!("; {e}")).collect()
}

/// Result alias for whole-record validation.
pub type Result<T> = std::result::Result<T, ValidationError>;
