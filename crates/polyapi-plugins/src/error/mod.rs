//! Errors raised while loading the catalog and while invoking facets.
//!
//! [`LoadError`] covers everything that can go wrong at startup and is always
//! fatal. [`FacetError`] is the tagged error record that flows out of entry
//! points and the authorization gate; the daemon translates it into an HTTP
//! status and body. [`ProcessError`] describes failures of process-backed
//! entry points and always surfaces as an internal fault.

use std::backtrace::Backtrace;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Structured detail attached to validation and not-found errors.
pub type Detail = Map<String, Value>;

/// Discriminator of a [`FacetError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials were rejected.
    AuthFailure,
    /// The request was malformed or referenced something invalid.
    ValidationFailure,
    /// The requested resource does not exist.
    NotFound,
    /// Anything else.
    InternalFault,
}

impl ErrorKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailure => "auth_failure",
            Self::ValidationFailure => "validation_failure",
            Self::NotFound => "not_found",
            Self::InternalFault => "internal_fault",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged error record produced by entry points and collaborators.
///
/// # Example
///
/// ```
/// use polyapi_plugins::{ErrorKind, FacetError};
///
/// let error = FacetError::validation("amount must be positive");
/// assert_eq!(error.kind(), ErrorKind::ValidationFailure);
/// assert_eq!(error.message(), "amount must be positive");
/// ```
#[derive(Debug, Clone, Error)]
pub enum FacetError {
    /// Credentials were rejected by the authorization gate.
    #[error("authorization failed: {message}")]
    AuthFailure {
        /// Reason reported by the gate. Never sent to the caller.
        message: String,
    },

    /// Bad input from the caller.
    #[error("{message}")]
    ValidationFailure {
        /// Caller-visible message.
        message: String,
        /// Optional structured body merged into the response.
        detail: Option<Detail>,
    },

    /// A referenced resource is missing.
    #[error("{message}")]
    NotFound {
        /// Caller-visible message.
        message: String,
        /// Optional structured body merged into the response.
        detail: Option<Detail>,
    },

    /// Unexpected failure; logged with its trace and never translated.
    #[error("internal fault: {message}")]
    InternalFault {
        /// Operator-facing description.
        message: String,
        /// Stack trace captured where the fault was raised.
        trace: Arc<str>,
    },
}

impl FacetError {
    /// Creates an authorization failure.
    #[must_use]
    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self::AuthFailure {
            message: message.into(),
        }
    }

    /// Creates a validation failure carrying a plain message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
            detail: None,
        }
    }

    /// Creates a validation failure carrying a structured detail body.
    #[must_use]
    pub fn validation_with_detail(message: impl Into<String>, detail: Detail) -> Self {
        Self::ValidationFailure {
            message: message.into(),
            detail: Some(detail),
        }
    }

    /// Creates a not-found failure carrying a plain message.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            detail: None,
        }
    }

    /// Creates an internal fault, capturing the current stack trace.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalFault {
            message: message.into(),
            trace: Arc::from(Backtrace::force_capture().to_string()),
        }
    }

    /// Creates an internal fault from any error, flattening its source chain.
    #[must_use]
    pub fn internal_from(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::internal(message)
    }

    /// Returns the variant discriminator.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailure { .. } => ErrorKind::AuthFailure,
            Self::ValidationFailure { .. } => ErrorKind::ValidationFailure,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InternalFault { .. } => ErrorKind::InternalFault,
        }
    }

    /// Returns the human message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::AuthFailure { message }
            | Self::ValidationFailure { message, .. }
            | Self::NotFound { message, .. }
            | Self::InternalFault { message, .. } => message,
        }
    }

    /// Returns the structured detail, when present.
    #[must_use]
    pub const fn detail(&self) -> Option<&Detail> {
        match self {
            Self::ValidationFailure { detail, .. } | Self::NotFound { detail, .. } => {
                detail.as_ref()
            }
            Self::AuthFailure { .. } | Self::InternalFault { .. } => None,
        }
    }

    /// Rebuilds a record of the given kind, as reported across a process
    /// boundary.
    #[must_use]
    pub fn from_reported(kind: ErrorKind, message: String, detail: Option<Detail>) -> Self {
        match kind {
            ErrorKind::AuthFailure => Self::AuthFailure { message },
            ErrorKind::ValidationFailure => Self::ValidationFailure { message, detail },
            ErrorKind::NotFound => Self::NotFound { message, detail },
            ErrorKind::InternalFault => Self::internal(message),
        }
    }
}

/// Fatal errors raised while building the catalog.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The plugin root or one of its directories could not be listed.
    #[error("failed to read plugin directory '{path}': {source}")]
    Directory {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A group or facet directory name is not valid UTF-8.
    #[error("plugin directory name is not valid UTF-8: {path}")]
    NonUtf8Name {
        /// Offending path.
        path: PathBuf,
    },

    /// The facet manifest is missing or unparseable.
    #[error("facet '{facet}' has an unusable manifest at '{path}': {message}")]
    Manifest {
        /// Qualified facet name.
        facet: String,
        /// Manifest path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The manifest's `target` names a form that does not exist.
    #[error("facet '{facet}' selects unknown target form '{target}'")]
    UnknownTarget {
        /// Qualified facet name.
        facet: String,
        /// Requested form name.
        target: String,
    },

    /// The sanitised entry point spec is not `module.function`.
    #[error("facet '{facet}' has an invalid entry point '{spec}': {reason}")]
    InvalidEntryPoint {
        /// Qualified facet name.
        facet: String,
        /// Spec after sanitisation.
        spec: String,
        /// Why the spec was rejected.
        reason: String,
    },

    /// The module portion could not be resolved.
    #[error("facet '{facet}' cannot resolve module '{module}': {message}")]
    UnresolvedModule {
        /// Qualified facet name.
        facet: String,
        /// Module path from the spec.
        module: String,
        /// Description of the failure.
        message: String,
    },

    /// The module resolved but does not expose the function.
    #[error("facet '{facet}' module '{module}' has no function '{function}'")]
    UnresolvedFunction {
        /// Qualified facet name.
        facet: String,
        /// Module path from the spec.
        module: String,
        /// Function name from the spec.
        function: String,
    },

    /// Two facets share a qualified name.
    #[error("facet '{facet}' is already registered")]
    DuplicateFacet {
        /// Qualified facet name.
        facet: String,
    },
}

/// Failures of process-backed entry points.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process could not be spawned.
    #[error("plugin '{name}' failed to start: {message}")]
    SpawnFailed {
        /// Qualified facet name.
        name: String,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// The process did not answer within the configured timeout.
    #[error("plugin '{name}' timed out after {timeout_secs}s")]
    Timeout {
        /// Qualified facet name.
        name: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// The process exited with a non-zero status code.
    #[error("plugin '{name}' exited with non-zero status {status}")]
    NonZeroExit {
        /// Qualified facet name.
        name: String,
        /// Process exit status.
        status: i32,
    },

    /// The request could not be serialised.
    #[error("failed to serialise plugin request: {0}")]
    SerializeRequest(#[source] serde_json::Error),

    /// The process wrote something other than one protocol line.
    #[error("plugin '{name}' wrote invalid output: {message}")]
    InvalidOutput {
        /// Qualified facet name.
        name: String,
        /// Description of the protocol violation.
        message: String,
    },

    /// An I/O error occurred while talking to the process.
    #[error("I/O error communicating with plugin '{name}': {source}")]
    Io {
        /// Qualified facet name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl From<ProcessError> for FacetError {
    fn from(error: ProcessError) -> Self {
        Self::internal_from(&error)
    }
}
