use miette::Diagnostic;
use thiserror::Error;

use crate::db::DbError;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] DbError),

    #[error("Invalid JSON: {message}")]
    #[diagnostic(
        code(voltron::cli::invalid_json),
        help("Records and queries are JSON objects, e.g. '{{\"lastName\": \"Smith\"}}'")
    )]
    InvalidJson { message: String },

    #[error("Invalid argument: {message}")]
    #[diagnostic(code(voltron::cli::invalid_argument))]
    InvalidArgument { message: String },

    #[error("No {resource} record with id {id}")]
    #[diagnostic(code(voltron::cli::not_found))]
    NotFound { resource: String, id: String },
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::InvalidJson {
            message: e.to_string(),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
