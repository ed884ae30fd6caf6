use tabula_core::{ApiError, FieldError, StatusCode};

use crate::storage::{ConstraintKind, StorageError};

/// Errors that can occur in the data layer.
///
/// Caller errors (`Validation`, `InvalidFilter`, `InvalidTypeLabel`,
/// `UnknownModel`, `NotLoaded`) are never retried. `Store` is a write the
/// storage engine refused on a constraint; it carries both the friendly and
/// the raw driver message. `Storage` is any other storage failure and is
/// propagated untranslated.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{}", joined(.0))]
    Validation(Vec<FieldError>),

    #[error("Unknown Model {0}")]
    UnknownModel(String),

    #[error("Invalid Type {label}")]
    InvalidTypeLabel { label: String },

    #[error("{kind} {key} not found")]
    NotLoaded { kind: String, key: String },

    #[error("{friendly}")]
    Store {
        friendly: String,
        raw: String,
        constraint: ConstraintKind,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid filter on '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn joined(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

impl DataError {
    pub fn not_loaded(kind: &str, key: impl ToString) -> Self {
        DataError::NotLoaded {
            kind: kind.to_string(),
            key: key.to_string(),
        }
    }

    pub fn invalid_filter(field: &str, reason: impl Into<String>) -> Self {
        DataError::InvalidFilter {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status the excluded transport layer should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            DataError::Validation(_)
            | DataError::InvalidFilter { .. }
            | DataError::InvalidTypeLabel { .. } => StatusCode::BAD_REQUEST,
            DataError::UnknownModel(_) | DataError::NotLoaded { .. } => StatusCode::NOT_FOUND,
            DataError::Store { .. } => StatusCode::CONFLICT,
            DataError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            DataError::Storage(_) | DataError::Schema(_) | DataError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Field-attributable messages, when the error has any.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            DataError::Validation(errors) => errors.clone(),
            DataError::InvalidFilter { field, reason } => {
                vec![FieldError::new(field.as_str(), reason.as_str(), "filter")]
            }
            DataError::InvalidTypeLabel { label } => {
                vec![FieldError::new("type", format!("Invalid Type {label}"), "type")]
            }
            _ => Vec::new(),
        }
    }

    /// The untranslated storage-engine message behind a refused write.
    pub fn raw_message(&self) -> Option<&str> {
        match self {
            DataError::Store { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match &err {
            DataError::Validation(errors) => ApiError::validation(errors.clone()),
            DataError::InvalidFilter { .. } | DataError::InvalidTypeLabel { .. } => ApiError {
                status: err.status(),
                body: serde_json::json!({
                    "error": err.to_string(),
                    "details": err.field_errors(),
                }),
            },
            // Internal failures keep their detail out of the response body.
            DataError::Storage(_) | DataError::Schema(_) | DataError::Serialization(_) => {
                tabula_core::error_response(err.status(), "Internal data error")
            }
            _ => tabula_core::error_response(err.status(), err.to_string()),
        }
    }
}
