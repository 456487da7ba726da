//! Entry point specs and the callable behind every facet.
//!
//! A manifest's `run` string is untrusted text. [`sanitize_run`] strips it
//! down to `[a-z0-9_.]` before [`EntryPointSpec::parse`] splits it into a
//! module path and a function name. Resolution then turns the spec into an
//! [`EntryPoint`] shared by all requests for the facet.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::envelope::{FacetContext, RequestEnvelope, ResponseEnvelope};
use crate::error::FacetError;

/// Removes every character outside `[a-z0-9_.]`.
///
/// Upper-case letters are removed, not folded.
///
/// # Example
///
/// ```
/// use polyapi_plugins::sanitize_run;
///
/// assert_eq!(sanitize_run("os.system('rm -rf')"), "os.systemrmrf");
/// assert_eq!(sanitize_run("handlers.process"), "handlers.process");
/// ```
#[must_use]
pub fn sanitize_run(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '.'))
        .collect()
}

/// Reasons a sanitised spec cannot name an entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryPointSpecError {
    /// Nothing was left after sanitisation.
    #[error("entry point spec is empty")]
    Empty,
    /// The spec has a function but no module.
    #[error("entry point spec needs a module and a function")]
    MissingModule,
    /// A dot-separated segment is empty (leading, trailing, or doubled dot).
    #[error("entry point spec contains an empty segment")]
    EmptySegment,
}

/// Sanitised `module.function` spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPointSpec {
    module: String,
    function: String,
}

impl EntryPointSpec {
    /// Sanitises `raw` and splits it on the last dot.
    ///
    /// # Errors
    ///
    /// Returns [`EntryPointSpecError`] when the sanitised text has fewer than
    /// two segments or any empty segment.
    ///
    /// # Example
    ///
    /// ```
    /// use polyapi_plugins::EntryPointSpec;
    ///
    /// let spec = EntryPointSpec::parse("lib.tools.Run()x").expect("valid spec");
    /// assert_eq!(spec.module(), "lib.tools");
    /// assert_eq!(spec.function(), "unx");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, EntryPointSpecError> {
        let sanitized = sanitize_run(raw);
        if sanitized.is_empty() {
            return Err(EntryPointSpecError::Empty);
        }
        if sanitized.split('.').any(str::is_empty) {
            return Err(EntryPointSpecError::EmptySegment);
        }
        let Some((module, function)) = sanitized.rsplit_once('.') else {
            return Err(EntryPointSpecError::MissingModule);
        };
        Ok(Self {
            module: module.to_owned(),
            function: function.to_owned(),
        })
    }

    /// Returns the dotted module path.
    #[must_use]
    pub const fn module(&self) -> &str {
        self.module.as_str()
    }

    /// Returns the function name.
    #[must_use]
    pub const fn function(&self) -> &str {
        self.function.as_str()
    }

    /// Iterates over the module path segments.
    pub fn module_segments(&self) -> impl Iterator<Item = &str> {
        self.module.split('.')
    }
}

impl fmt::Display for EntryPointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.function)
    }
}

/// Resolved callable behind a facet.
///
/// Implementations must tolerate concurrent calls; the catalog shares one
/// instance across every request for the facet.
pub trait EntryPoint: Send + Sync + fmt::Debug {
    /// Runs the facet against one request.
    ///
    /// # Errors
    ///
    /// Returns any [`FacetError`] the facet raises.
    fn call(
        &self,
        envelope: &RequestEnvelope,
        context: &FacetContext,
    ) -> Result<ResponseEnvelope, FacetError>;
}

/// In-process entry point closure.
pub type EntryFn = Arc<
    dyn Fn(&RequestEnvelope, &FacetContext) -> Result<ResponseEnvelope, FacetError> + Send + Sync,
>;

/// [`EntryPoint`] backed by an [`EntryFn`].
#[derive(Clone)]
pub struct FnEntryPoint {
    spec: EntryPointSpec,
    function: EntryFn,
}

impl FnEntryPoint {
    /// Binds a closure to the spec it was resolved from.
    #[must_use]
    pub const fn new(spec: EntryPointSpec, function: EntryFn) -> Self {
        Self { spec, function }
    }

    /// Returns the spec this entry point was resolved from.
    #[must_use]
    pub const fn spec(&self) -> &EntryPointSpec {
        &self.spec
    }
}

impl fmt::Debug for FnEntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEntryPoint")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl EntryPoint for FnEntryPoint {
    fn call(
        &self,
        envelope: &RequestEnvelope,
        context: &FacetContext,
    ) -> Result<ResponseEnvelope, FacetError> {
        (self.function)(envelope, context)
    }
}
