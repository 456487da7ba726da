//! BDD test world: encapsulates loader, reporter, and daemon/bootstrap state for step functions.
//!
use std::cell::RefCell;
use std::sync::Arc;

use polyapi_config::Config;
use polyapi_plugins::{FacetError, RequestEnvelope};
use serde_json::json;

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};
use crate::dispatch::DispatchOutcome;
use crate::endpoints::{FACET_PARAM, POLYFORM_PATH};

use super::config_loader::{FailingConfigLoader, TestConfigLoader, sample_modules};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    response: Option<Result<DispatchOutcome, FacetError>>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
            response: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Installs a loader that succeeds.
    pub fn use_successful_loader(&mut self) {
        self.loader = Box::new(TestConfigLoader::new());
        self.reset_results();
    }

    /// Installs a loader whose merged configuration carries `overrides`.
    pub fn use_overrides(&mut self, overrides: Config) {
        self.loader = Box::new(TestConfigLoader::with_overrides(overrides));
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }

        match bootstrap_with(&*self.loader, self.reporter.clone(), |_| sample_modules()) {
            Ok(daemon) => {
                self.daemon = Some(daemon);
            }
            Err(error) => {
                self.bootstrap_error = Some(error);
            }
        }
    }

    /// Returns whether bootstrap produced an error.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns the daemon when bootstrap succeeded.
    #[must_use]
    pub fn daemon(&self) -> Option<&Daemon> {
        self.daemon.as_ref()
    }

    /// Posts `{"amount": amount}` to `facet` through the daemon's dispatcher.
    pub fn post_amount(&mut self, facet: &str, amount: i64) {
        let Some(daemon) = self.daemon.as_ref() else {
            return;
        };
        let envelope = RequestEnvelope::new()
            .with_body(json!({"amount": amount}))
            .with_param(FACET_PARAM, facet);
        self.response = Some(daemon.dispatcher().dispatch("POST", POLYFORM_PATH, &envelope));
    }

    /// Returns the last dispatch result, if any.
    #[must_use]
    pub fn response(&self) -> Option<&Result<DispatchOutcome, FacetError>> {
        self.response.as_ref()
    }

    fn reset_results(&mut self) {
        self.daemon = None;
        self.bootstrap_error = None;
        self.response = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
