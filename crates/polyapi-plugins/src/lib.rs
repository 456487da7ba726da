//! Facet discovery, entry point resolution, and invocation envelopes.
//!
//! A plugin tree is a two-level directory hierarchy: every directory under
//! the root is a *group*, and every directory inside a group is a *facet*.
//! Each facet carries a `_polyform.json` manifest listing named forms and the
//! selected target form. The target form's `run` string names an entry point
//! as `module.function`.
//!
//! [`PluginCatalog::load`] walks the tree once at startup, sanitises every
//! entry point spec, resolves it through a [`ModuleResolver`], and produces an
//! immutable registry keyed by qualified name (`group.facet`). Any failure is
//! fatal: the catalog never hides a facet that failed to load.
//!
//! Two resolvers ship with the crate:
//!
//! - [`StaticModules`] maps module and function names onto Rust closures
//!   compiled into the host binary.
//! - [`ProcessResolver`] maps the module path onto an executable inside the
//!   facet directory and speaks a single-line JSONL protocol with it.
//!
//! Entry points receive the request envelope plus a [`FacetContext`] holding
//! the facet's absolute base directory, so no entry point relies on the
//! process working directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use polyapi_plugins::{PluginCatalog, ResponseEnvelope, StaticModules};
//!
//! let modules = StaticModules::new().with_function("handlers", "process", |envelope, _ctx| {
//!     Ok(ResponseEnvelope::from_value(envelope.parsed_body().clone())?)
//! });
//!
//! let catalog = PluginCatalog::load(Path::new("./polys"), &modules).expect("catalog loads");
//! assert!(catalog.get("billing.invoice").is_some());
//! ```

pub mod catalog;
pub mod entry;
pub mod envelope;
pub mod error;
pub mod manifest;
pub mod process;
pub mod protocol;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use self::catalog::{PluginCatalog, PluginHandle};
pub use self::entry::{
    EntryFn, EntryPoint, EntryPointSpec, EntryPointSpecError, FnEntryPoint, sanitize_run,
};
pub use self::envelope::{FacetContext, RequestEnvelope, ResponseEnvelope, ResponseStatus};
pub use self::error::{Detail, ErrorKind, FacetError, LoadError, ProcessError};
pub use self::manifest::{FormSpec, MANIFEST_FILE, PluginManifest};
pub use self::process::{ProcessEntryPoint, ProcessResolver};
pub use self::resolver::{ModuleResolver, ResolutionScope, ResolveError, StaticModules};
