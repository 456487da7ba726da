//! Test configuration loaders for scenarios covering success and failure paths.
//!
use std::ffi::OsString;
use std::fs;
use std::sync::Arc;

use ortho_config::OrthoError;
use polyapi_config::Config;
use polyapi_plugins::{FacetError, MANIFEST_FILE, ResponseEnvelope, StaticModules};
use serde_json::json;
use tempfile::TempDir;

use crate::bootstrap::ConfigLoader;

/// Loader that provisions a plugin tree holding `billing.invoice` under a
/// temporary directory.
pub struct TestConfigLoader {
    plugin_dir: TempDir,
    overrides: Config,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::with_overrides(Config::default())
    }

    /// Applies `overrides` on top of the provisioned plugin root.
    #[must_use]
    pub fn with_overrides(overrides: Config) -> Self {
        let dir = TempDir::new().expect("failed to create temporary plugin root");
        let facet = dir.path().join("billing").join("invoice");
        fs::create_dir_all(&facet).expect("create facet dir");
        let manifest = json!({"forms": {"default": {"run": "handlers.process"}}, "target": "default"});
        fs::write(facet.join(MANIFEST_FILE), manifest.to_string()).expect("write manifest");
        Self {
            plugin_dir: dir,
            overrides,
        }
    }

    fn plugin_root(&self) -> String {
        self.plugin_dir
            .path()
            .to_str()
            .expect("temporary plugin root was not valid UTF-8")
            .to_owned()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let plugin_root = self
            .overrides
            .plugin_root
            .clone()
            .unwrap_or_else(|| self.plugin_root().into());
        Ok(Config {
            plugin_root: Some(plugin_root),
            ..self.overrides.clone()
        })
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("polyapid"),
            OsString::from("--port"),
            OsString::from("notaport"),
        ];
        Config::load_from_iter(args)
    }
}

/// In-process modules backing the provisioned facet.
#[must_use]
pub fn sample_modules() -> StaticModules {
    StaticModules::new().with_function("handlers", "process", |envelope, _ctx| {
        let amount = envelope
            .parsed_body()
            .get("amount")
            .cloned()
            .ok_or_else(|| FacetError::validation("amount is required"))?;
        Ok(ResponseEnvelope::new()
            .with_field("amount", amount.clone())
            .with_field("total", amount))
    })
}
