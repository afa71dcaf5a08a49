//! Error and warning types for roast-log ingestion
//!
//! Fatal problems abort the ingestion of one document and surface as
//! [`IngestError`]. Everything else is collected as an [`IngestWarning`] and
//! travels with the record that was produced.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RoastEvent;

/// Fatal ingestion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("malformed document at line {line}, column {column} (byte {offset}): {message}")]
    MalformedDocument {
        offset: usize,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("missing required field `{field}`")]
    MissingRequiredField { field: String },

    #[error("field `{field}` has the wrong shape: expected {expected}, found {found}")]
    SchemaMismatch {
        field: String,
        expected: String,
        found: String,
    },
}

impl IngestError {
    pub(crate) fn missing(field: &str) -> Self {
        IngestError::MissingRequiredField {
            field: field.to_string(),
        }
    }

    pub(crate) fn mismatch(field: &str, expected: &str, found: impl Into<String>) -> Self {
        IngestError::SchemaMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            found: found.into(),
        }
    }

    /// Stable machine-readable code for reports
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::MalformedDocument { .. } => "MALFORMED_DOCUMENT",
            IngestError::MissingRequiredField { .. } => "MISSING_REQUIRED_FIELD",
            IngestError::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
        }
    }
}

/// An ingestion error tagged with the source it came from
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source_name}: {error}")]
pub struct IngestFailure {
    pub source_name: String,
    pub error: IngestError,
}

/// Rejected engine configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid engine configuration `{field}`: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Result type alias for engine stages
pub type IngestResult<T> = Result<T, IngestError>;

/// Non-fatal findings attached to a successfully produced record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestWarning {
    /// An optional field was present but could not be coerced; it is absent
    /// from the record.
    FieldCoercionFailure {
        field: String,
        expected: String,
        found: String,
    },

    /// The logger's computed event time and the index list disagree.
    EventSourceMismatch {
        event: RoastEvent,
        computed_time: f64,
        index_time: f64,
    },

    /// Resolved event times run backwards in canonical order.
    EventOrderViolation {
        earlier: RoastEvent,
        later: RoastEvent,
        earlier_time: f64,
        later_time: f64,
    },

    EventIndexOutOfRange {
        event: RoastEvent,
        index: i64,
        series_len: usize,
    },

    NonMonotonicTime {
        index: usize,
        previous: f64,
        current: f64,
    },

    SpecialEventIgnored { position: usize, reason: String },

    /// The three special-event arrays have different lengths.
    SpecialEventsRagged {
        events: usize,
        types: usize,
        values: usize,
    },
}

impl IngestWarning {
    pub fn coercion(field: &str, expected: &str, found: &str) -> Self {
        IngestWarning::FieldCoercionFailure {
            field: field.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl std::fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestWarning::FieldCoercionFailure {
                field,
                expected,
                found,
            } => write!(
                f,
                "field `{}` dropped: expected {}, found {}",
                field, expected, found
            ),
            IngestWarning::EventSourceMismatch {
                event,
                computed_time,
                index_time,
            } => write!(
                f,
                "{} computed at {:.1}s but indexed at {:.1}s",
                event, computed_time, index_time
            ),
            IngestWarning::EventOrderViolation {
                earlier,
                later,
                earlier_time,
                later_time,
            } => write!(
                f,
                "{} at {:.1}s precedes {} at {:.1}s",
                later, later_time, earlier, earlier_time
            ),
            IngestWarning::EventIndexOutOfRange {
                event,
                index,
                series_len,
            } => write!(
                f,
                "{} index {} outside series of {} samples",
                event, index, series_len
            ),
            IngestWarning::NonMonotonicTime {
                index,
                previous,
                current,
            } => write!(
                f,
                "timex goes backwards at sample {} ({} -> {})",
                index, previous, current
            ),
            IngestWarning::SpecialEventIgnored { position, reason } => {
                write!(f, "special event #{} ignored: {}", position, reason)
            }
            IngestWarning::SpecialEventsRagged {
                events,
                types,
                values,
            } => write!(
                f,
                "special event arrays differ in length ({} / {} / {})",
                events, types, values
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(IngestError::missing("title").code(), "MISSING_REQUIRED_FIELD");
        assert_eq!(
            IngestError::mismatch("timex", "numeric sequence", "text").code(),
            "SCHEMA_MISMATCH"
        );
    }

    #[test]
    fn test_failure_carries_source_name() {
        let failure = IngestFailure {
            source_name: "monday.alog".to_string(),
            error: IngestError::missing("roastUUID"),
        };
        assert_eq!(
            failure.to_string(),
            "monday.alog: missing required field `roastUUID`"
        );
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = IngestWarning::coercion("roastersize", "number", "text");
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "field_coercion_failure");
        assert_eq!(json["field"], "roastersize");
    }
}
