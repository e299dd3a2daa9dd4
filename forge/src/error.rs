//! Error types.
//!
//! Field validation failures are plain data ([`FieldError`]) and never travel
//! through `Result`. The enums here cover the few places where something
//! outside the field itself went wrong.

use std::any::Any;

use thiserror::Error;

/// A single rule failure on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path of the field in the form values.
    pub field_name: String,
    /// Rule that failed (`required`, `min_length`, `pattern`, ...).
    pub kind: String,
    /// Message shown to the user.
    pub message: String,
}

impl FieldError {
    pub fn new(
        field_name: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Failure loading options or building rules.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid validator options: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A middleware could not produce a result.
///
/// The pipeline logs it and treats the middleware as having no opinion.
#[derive(Debug, Clone, Error)]
pub enum MiddlewareError {
    #[error("Middleware '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("Middleware '{name}' panicked: {message}")]
    Panicked { name: String, message: String },
}

impl MiddlewareError {
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Rejection from a caller-supplied async validator.
#[derive(Debug, Clone, Error)]
#[error("Async validation of '{field}' failed: {message}")]
pub struct AsyncValidationError {
    pub field: String,
    pub message: String,
}

impl AsyncValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Extract a readable message from a caught panic payload.
pub fn extract_panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
