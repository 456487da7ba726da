//! Errors raised while mounting capability tables.

use thiserror::Error;

use super::verb::Operation;

/// Registration failures detected before the dispatcher serves anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A table was mounted without an operation its path requires.
    #[error("path '{path}' requires the {operation} operation")]
    MissingCapability {
        /// Path key being mounted.
        path: String,
        /// Operation the table lacks.
        operation: Operation,
    },

    /// The same path key was mounted twice.
    #[error("path '{path}' is already mounted")]
    DuplicatePath {
        /// Repeated path key.
        path: String,
    },
}
