//! Error types shared across the widget framework.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type for widget framework operations.
pub type WidgetResult<T> = Result<T, WidgetError>;

/// A validation failure for a single configuration field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    /// Name of the field that failed validation.
    pub field: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl FieldError {
    /// Create a field error for `field` with the given message.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur in the widget framework.
#[derive(Error, Debug)]
pub enum WidgetError {
    /// Registry could not be built from the configured class identifiers.
    /// Fatal at startup.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A widget-class name on a stored or submitted instance is not registered.
    #[error("no widget class named '{0}' found")]
    UnknownWidgetClass(String),

    /// One or more configuration fields failed validation. Nothing was
    /// persisted.
    #[error("invalid configuration: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// An explicit insert position fell outside `0..=len`.
    #[error("position {position} out of range for list of length {len}")]
    PositionOutOfRange { position: i64, len: i64 },

    /// A referenced widget list or widget instance does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    /// An external fetch (RSS feed) failed. Recovered locally with a fallback
    /// rendering, never surfaced to API callers.
    #[error("external fetch failed: {0}")]
    ExternalFetch(String),

    /// Storage-level failure. Mutating operations are not retried on this;
    /// the caller must re-request.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored configuration document could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl WidgetError {
    /// Configuration error with the given reason.
    pub fn configuration(reason: impl Into<String>) -> Self {
        WidgetError::Configuration {
            reason: reason.into(),
        }
    }

    /// Validation error for a single field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        WidgetError::Validation(vec![FieldError::new(field, message)])
    }

    /// True if this error maps to a client error (4xx) rather than a server
    /// fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WidgetError::UnknownWidgetClass(_)
                | WidgetError::Validation(_)
                | WidgetError::PositionOutOfRange { .. }
                | WidgetError::NotFound { .. }
        )
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<rusqlite::Error> for WidgetError {
    fn from(err: rusqlite::Error) -> Self {
        WidgetError::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for WidgetError {
    fn from(err: r2d2::Error) -> Self {
        WidgetError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for WidgetError {
    fn from(err: serde_json::Error) -> Self {
        WidgetError::Json(err.to_string())
    }
}
