//! Facet discovery and the immutable catalog of resolved entry points.
//!
//! The catalog is built once, before any request is served. Loading walks
//! `<root>/<group>/<facet>`, reads each facet's manifest, sanitises and
//! resolves the selected entry point, and stores the result under the
//! qualified name `group.facet`. Every failure aborts the load.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::entry::{EntryPoint, EntryPointSpec};
use crate::envelope::{FacetContext, RequestEnvelope, ResponseEnvelope};
use crate::error::{FacetError, LoadError};
use crate::manifest::{MANIFEST_FILE, PluginManifest};
use crate::resolver::{ModuleResolver, ResolutionScope, ResolveError};

/// Tracing target for catalog loading.
const CATALOG_TARGET: &str = "polyapi_plugins::catalog";

/// A loaded facet.
#[derive(Clone)]
pub struct PluginHandle {
    name: String,
    base_dir: PathBuf,
    manifest: PluginManifest,
    spec: EntryPointSpec,
    entry: Arc<dyn EntryPoint>,
}

impl PluginHandle {
    /// Returns the qualified name (`group.facet`).
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the facet's absolute base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the parsed manifest.
    #[must_use]
    pub const fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Returns the selected form name.
    #[must_use]
    pub const fn form(&self) -> &str {
        self.manifest.target()
    }

    /// Returns the sanitised entry point spec.
    #[must_use]
    pub const fn spec(&self) -> &EntryPointSpec {
        &self.spec
    }

    /// Returns the resolved entry point.
    #[must_use]
    pub const fn entry(&self) -> &Arc<dyn EntryPoint> {
        &self.entry
    }

    /// Builds the per-call context for this facet.
    #[must_use]
    pub fn context(&self, request_id: &str) -> FacetContext {
        FacetContext::new(self.name.as_str(), self.base_dir.as_path(), request_id)
    }

    /// Calls the entry point with a freshly built context.
    ///
    /// # Errors
    ///
    /// Returns whatever [`FacetError`] the entry point raises.
    pub fn call(
        &self,
        envelope: &RequestEnvelope,
        request_id: &str,
    ) -> Result<ResponseEnvelope, FacetError> {
        self.entry.call(envelope, &self.context(request_id))
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name)
            .field("base_dir", &self.base_dir)
            .field("form", &self.form())
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Immutable registry of loaded facets keyed by qualified name.
///
/// # Example
///
/// ```
/// use polyapi_plugins::{PluginCatalog, StaticModules};
///
/// let root = tempfile::tempdir().expect("temp dir");
/// let catalog = PluginCatalog::load(root.path(), &StaticModules::new()).expect("empty tree loads");
/// assert!(catalog.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    root: PathBuf,
    handles: BTreeMap<String, PluginHandle>,
}

impl PluginCatalog {
    /// Discovers and resolves every facet under `root`.
    ///
    /// # Errors
    ///
    /// Returns the first [`LoadError`] encountered: an unreadable directory,
    /// a missing or malformed manifest, an unknown target form, an invalid or
    /// unresolvable entry point, or a duplicate qualified name.
    pub fn load<R>(root: &Path, resolver: &R) -> Result<Self, LoadError>
    where
        R: ModuleResolver + ?Sized,
    {
        let canonical_root = root.canonicalize().map_err(|err| LoadError::Directory {
            path: root.to_path_buf(),
            source: Arc::new(err),
        })?;
        let mut handles = BTreeMap::new();

        for (group, group_dir) in subdirectories(&canonical_root)? {
            info!(target: CATALOG_TARGET, group = group.as_str(), "found polyform group");
            for (facet, facet_dir) in subdirectories(&group_dir)? {
                let name = format!("{group}.{facet}");
                info!(target: CATALOG_TARGET, facet = name.as_str(), "found facet");
                if handles.contains_key(&name) {
                    return Err(LoadError::DuplicateFacet { facet: name });
                }
                let handle = load_facet(name.clone(), facet_dir, resolver)?;
                handles.insert(name, handle);
            }
        }

        info!(
            target: CATALOG_TARGET,
            root = %canonical_root.display(),
            facets = handles.len(),
            "catalog loaded"
        );
        Ok(Self {
            root: canonical_root,
            handles,
        })
    }

    /// Returns the canonical plugin root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up a facet by qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PluginHandle> {
        self.handles.get(name)
    }

    /// Iterates over qualified names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    /// Iterates over handles in name order.
    pub fn iter(&self) -> impl Iterator<Item = &PluginHandle> {
        self.handles.values()
    }

    /// Returns the number of loaded facets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` when no facets were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Lists the directories directly inside `dir`, sorted by name.
fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>, LoadError> {
    let directory_error = |err: std::io::Error| LoadError::Directory {
        path: dir.to_path_buf(),
        source: Arc::new(err),
    };
    let mut found = Vec::new();
    for item in fs::read_dir(dir).map_err(directory_error)? {
        let entry = item.map_err(directory_error)?;
        let path = entry.path();
        if !path.is_dir() {
            debug!(target: CATALOG_TARGET, path = %path.display(), "skipping non-directory");
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| LoadError::NonUtf8Name { path: path.clone() })?;
        found.push((name, path));
    }
    found.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(found)
}

fn load_facet<R>(name: String, base_dir: PathBuf, resolver: &R) -> Result<PluginHandle, LoadError>
where
    R: ModuleResolver + ?Sized,
{
    let manifest_path = base_dir.join(MANIFEST_FILE);
    let manifest_error = |message: String| LoadError::Manifest {
        facet: name.clone(),
        path: manifest_path.clone(),
        message,
    };
    let text = fs::read_to_string(&manifest_path).map_err(|err| manifest_error(err.to_string()))?;
    let manifest =
        PluginManifest::from_json_str(&text).map_err(|err| manifest_error(err.to_string()))?;

    let form = manifest
        .target_form()
        .ok_or_else(|| LoadError::UnknownTarget {
            facet: name.clone(),
            target: manifest.target().to_owned(),
        })?;
    let run = form.run().ok_or_else(|| {
        manifest_error(format!(
            "target form '{}' has no 'run' entry",
            manifest.target()
        ))
    })?;
    let spec = EntryPointSpec::parse(run).map_err(|err| LoadError::InvalidEntryPoint {
        facet: name.clone(),
        spec: crate::entry::sanitize_run(run),
        reason: err.to_string(),
    })?;

    let scope = ResolutionScope::new(name.as_str(), base_dir.as_path());
    let entry = resolver
        .resolve(&spec, &scope)
        .map_err(|err| match err {
            ResolveError::UnknownModule { module, message } => LoadError::UnresolvedModule {
                facet: name.clone(),
                module,
                message,
            },
            ResolveError::UnknownFunction { module, function } => {
                LoadError::UnresolvedFunction {
                    facet: name.clone(),
                    module,
                    function,
                }
            }
        })?;

    debug!(
        target: CATALOG_TARGET,
        facet = name.as_str(),
        form = manifest.target(),
        entry = %spec,
        "resolved facet entry point"
    );

    Ok(PluginHandle {
        name,
        base_dir,
        manifest,
        spec,
        entry,
    })
}
