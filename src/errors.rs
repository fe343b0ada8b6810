//! Typed failures that callers may want to tell apart.
//!
//! Operations return `anyhow::Result`; these variants travel inside the
//! `anyhow::Error` and can be recovered with `downcast_ref::<BundleError>()`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// An archive entry or user-supplied path failed validation.
    #[error("path '{path}' is not valid: {reason}")]
    InvalidPath { path: String, reason: String },

    /// An import has no registered module.
    #[error("import '{0}' is undefined")]
    UndefinedImport(String),

    /// A requested git tag does not exist.
    #[error("version '{0}' is not found")]
    TagNotFound(String),

    #[error("failed to validate bundle manifest: {0}")]
    InvalidManifest(String),

    #[error("command '{0}' is not registered")]
    UnknownCommand(String),

    /// A command was registered before one of the commands it requires.
    #[error("command '{command}' requires '{requires}', which is not registered")]
    MissingDependency { command: String, requires: String },

    #[error("command '{name}' in '{parent}' command already exists")]
    DuplicateCommand { name: String, parent: String },

    #[error("invalid input type for '{command}' command")]
    InvalidInput { command: String },
}

impl BundleError {
    pub(crate) fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        BundleError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
