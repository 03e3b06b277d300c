//! Database error types.
//!
//! This module provides abstracted error types for persistence operations.
//! It uses miette for fancy diagnostic output and thiserror for derive macros.
//! The error types are storage-backend agnostic; backend errors are carried
//! as messages so a single failure can be handed to every caller waiting on
//! the same connection attempt.

use miette::Diagnostic;
use thiserror::Error;

/// Persistence operation errors.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("Connection error: {message}")]
    #[diagnostic(code(voltron::db::connection_error))]
    Connection { message: String },

    #[error("Backend error during {operation} on '{resource}': {message}")]
    #[diagnostic(code(voltron::db::backend_error))]
    Backend {
        operation: &'static str,
        resource: String,
        message: String,
    },

    #[error("Hook contract violated: {message}")]
    #[diagnostic(
        code(voltron::db::hook_contract),
        help("Declare the hook with BeforeSave::callback or BeforeSave::future")
    )]
    HookContract { message: String },

    #[error("Hook failed: {message}")]
    #[diagnostic(code(voltron::db::hook_failed))]
    Hook { message: String },

    #[error("Invalid identifier '{value}': {help}")]
    #[diagnostic(code(voltron::db::invalid_identifier))]
    InvalidIdentifier { value: String, help: String },

    #[error("Invalid data: {message} (hint: {help})")]
    #[diagnostic(code(voltron::db::invalid_data))]
    InvalidData { message: String, help: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(voltron::db::configuration))]
    Configuration { message: String },
}

impl DbError {
    /// Build a backend error for `operation` on `resource`.
    pub fn backend(operation: &'static str, resource: &str, err: impl ToString) -> Self {
        DbError::Backend {
            operation,
            resource: resource.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for persistence operations.
pub type DbResult<T> = Result<T, DbError>;
