//! Module resolution for entry point specs.
//!
//! A [`ModuleResolver`] turns an [`EntryPointSpec`] into a callable
//! [`EntryPoint`]. Each resolution receives a [`ResolutionScope`] bound to a
//! single facet directory, so one facet's lookup never leaks into another's
//! and no global search path is extended.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::entry::{EntryFn, EntryPoint, EntryPointSpec, FnEntryPoint};
use crate::envelope::{FacetContext, RequestEnvelope, ResponseEnvelope};
use crate::error::FacetError;

/// Facet directory a resolution is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionScope<'a> {
    facet: &'a str,
    base_dir: &'a Path,
}

impl<'a> ResolutionScope<'a> {
    /// Creates a scope for the named facet rooted at `base_dir`.
    #[must_use]
    pub const fn new(facet: &'a str, base_dir: &'a Path) -> Self {
        Self { facet, base_dir }
    }

    /// Returns the qualified facet name.
    #[must_use]
    pub const fn facet(&self) -> &'a str {
        self.facet
    }

    /// Returns the facet's absolute base directory.
    #[must_use]
    pub const fn base_dir(&self) -> &'a Path {
        self.base_dir
    }
}

/// Why a spec could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The module path does not name anything the resolver knows.
    #[error("module '{module}' cannot be resolved: {message}")]
    UnknownModule {
        /// Module path from the spec.
        module: String,
        /// Description of the failure.
        message: String,
    },
    /// The module exists but lacks the function.
    #[error("module '{module}' has no function '{function}'")]
    UnknownFunction {
        /// Module path from the spec.
        module: String,
        /// Function name from the spec.
        function: String,
    },
}

/// Resolves entry point specs into callables.
pub trait ModuleResolver {
    /// Resolves `spec` within `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the module or the function is missing.
    fn resolve(
        &self,
        spec: &EntryPointSpec,
        scope: &ResolutionScope<'_>,
    ) -> Result<Arc<dyn EntryPoint>, ResolveError>;
}

/// In-process table of modules and their functions.
///
/// # Example
///
/// ```
/// use std::path::Path;
///
/// use polyapi_plugins::{
///     EntryPointSpec, ModuleResolver, ResolutionScope, ResponseEnvelope, StaticModules,
/// };
///
/// let modules = StaticModules::new()
///     .with_function("handlers", "ping", |_envelope, _ctx| Ok(ResponseEnvelope::success()));
/// let spec = EntryPointSpec::parse("handlers.ping").expect("valid spec");
/// let scope = ResolutionScope::new("tools.ping", Path::new("/srv/polys/tools/ping"));
/// assert!(modules.resolve(&spec, &scope).is_ok());
/// ```
#[derive(Clone, Default)]
pub struct StaticModules {
    modules: BTreeMap<String, BTreeMap<String, EntryFn>>,
}

impl StaticModules {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module.function`, replacing any previous registration.
    #[must_use]
    pub fn with_function<F>(mut self, module: &str, function: &str, entry: F) -> Self
    where
        F: Fn(&RequestEnvelope, &FacetContext) -> Result<ResponseEnvelope, FacetError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(module, function, Arc::new(entry));
        self
    }

    /// Registers a shared closure in place.
    pub fn insert(&mut self, module: &str, function: &str, entry: EntryFn) {
        self.modules
            .entry(module.to_owned())
            .or_default()
            .insert(function.to_owned(), entry);
    }

    /// Returns the registered module names in sorted order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for StaticModules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (module, functions) in &self.modules {
            map.entry(module, &functions.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl ModuleResolver for StaticModules {
    fn resolve(
        &self,
        spec: &EntryPointSpec,
        _scope: &ResolutionScope<'_>,
    ) -> Result<Arc<dyn EntryPoint>, ResolveError> {
        let functions =
            self.modules
                .get(spec.module())
                .ok_or_else(|| ResolveError::UnknownModule {
                    module: spec.module().to_owned(),
                    message: String::from("no module registered under this name"),
                })?;
        let entry = functions
            .get(spec.function())
            .ok_or_else(|| ResolveError::UnknownFunction {
                module: spec.module().to_owned(),
                function: spec.function().to_owned(),
            })?;
        Ok(Arc::new(FnEntryPoint::new(spec.clone(), Arc::clone(entry))))
    }
}
