//! Error types for sm-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sm-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backup rename or write of a container failed
    #[error("failed to persist '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed manual text entry
    #[error("\"{input}\" is not a valid text entry in the format [Name]:[ID]:[Text]: {reason}")]
    ManualEntry { input: String, reason: String },

    /// Malformed edit-script statement
    #[error("invalid edit-script statement '{line}': {reason}")]
    ScriptParse { line: String, reason: String },

    /// Failed to parse CSV
    #[error("failed to parse CSV '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Writing a CSV export failed
    #[error("failed to write CSV for param '{param}': {source}")]
    CsvWrite {
        param: String,
        #[source]
        source: csv::Error,
    },

    /// A text bank required by a merge does not exist in the container
    #[error("could not find text bank by name of '{name}' in {container}")]
    BankNotFound { name: String, container: String },

    /// A named param is not present in the bank
    #[error("'{0}' does not correspond to any params in the bank")]
    ParamNotFound(String),

    /// A field named by a statement or CSV header does not exist
    #[error("param '{param}' has no field named '{field}'")]
    FieldNotFound { param: String, field: String },

    /// A value could not be converted to a field's storage type
    #[error("invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },

    /// A successor slot was needed but the container has nothing to copy from
    #[error("container has no existing {0} to derive a new entry from")]
    EmptyContainer(&'static str),

    /// A path has no usable file name
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
