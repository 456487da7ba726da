//! Facet manifest types.
//!
//! Every facet directory carries a [`MANIFEST_FILE`] describing the forms the
//! facet can run in and which form is selected. Only the selected form's `run`
//! entry matters to the catalog; any other keys are preserved verbatim so
//! tooling that reads the manifest back sees what the author wrote.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File name of the manifest inside each facet directory.
pub const MANIFEST_FILE: &str = "_polyform.json";

/// One named form of a facet.
///
/// # Example
///
/// ```
/// use polyapi_plugins::FormSpec;
///
/// let form = FormSpec::new("handlers.process");
/// assert_eq!(form.run(), Some("handlers.process"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl FormSpec {
    /// Creates a form running the given entry point spec.
    #[must_use]
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            run: Some(run.into()),
            extra: Map::new(),
        }
    }

    /// Returns the raw, unsanitised entry point spec.
    #[must_use]
    pub fn run(&self) -> Option<&str> {
        self.run.as_deref()
    }

    /// Returns keys the catalog does not interpret.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Parsed `_polyform.json`.
///
/// # Example
///
/// ```
/// use polyapi_plugins::PluginManifest;
///
/// let manifest = PluginManifest::from_json_str(
///     r#"{"forms": {"default": {"run": "handlers.process"}}, "target": "default"}"#,
/// )
/// .expect("manifest parses");
///
/// assert_eq!(manifest.target(), "default");
/// assert_eq!(
///     manifest.target_form().and_then(|form| form.run()),
///     Some("handlers.process")
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    forms: BTreeMap<String, FormSpec>,
    target: String,
}

impl PluginManifest {
    /// Creates a manifest with no forms selecting `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            forms: BTreeMap::new(),
            target: target.into(),
        }
    }

    /// Adds or replaces a named form.
    #[must_use]
    pub fn with_form(mut self, name: impl Into<String>, form: FormSpec) -> Self {
        self.forms.insert(name.into(), form);
        self
    }

    /// Parses a manifest from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the text is not a manifest object.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Returns the selected form name.
    #[must_use]
    pub const fn target(&self) -> &str {
        self.target.as_str()
    }

    /// Returns the selected form, if the manifest defines it.
    #[must_use]
    pub fn target_form(&self) -> Option<&FormSpec> {
        self.forms.get(&self.target)
    }

    /// Returns every declared form.
    #[must_use]
    pub const fn forms(&self) -> &BTreeMap<String, FormSpec> {
        &self.forms
    }
}
