use http::StatusCode;
use serde::Serialize;

/// A field-level error detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// An error ready to be written out by the HTTP layer: a status and a JSON body.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

/// Helper to create an error with a standard `{ "error": message }` body.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    ApiError {
        status,
        body: serde_json::json!({ "error": message.into() }),
    }
}

impl ApiError {
    /// `400 Bad Request` carrying `{ "error": "Validation failed", "details": [...] }`.
    pub fn validation(details: Vec<FieldError>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            body: serde_json::json!({
                "error": "Validation failed",
                "details": details,
            }),
        }
    }

    /// The `error` message of the body, if any.
    pub fn message(&self) -> Option<&str> {
        self.body.get("error").and_then(|v| v.as_str())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message().unwrap_or("error"), self.status)
    }
}

impl std::error::Error for ApiError {}
