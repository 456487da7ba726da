//! Daemon bootstrap orchestration.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::OrthoError;
use polyapi_config::{Config, ConfigError};
use polyapi_plugins::{LoadError, ModuleResolver, PluginCatalog, ProcessResolver};
use thiserror::Error;
use tracing::warn;

use crate::auth::{AUTH_TARGET, AllowAll, Authorizer, StaticTokenAuthorizer};
use crate::dispatch::{DispatchError, Dispatcher, ErrorTranslator};
use crate::endpoints::build_dispatcher;
use crate::health::HealthReporter;
use crate::heartbeat::Heartbeat;
use crate::invoker::FacetInvoker;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's aggregated error when a source fails to parse.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out an already merged configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but holds unusable values.
    #[error("invalid configuration: {source}")]
    Validation {
        /// First offending field.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The plugin tree could not be loaded.
    #[error("failed to load plugin catalog: {source}")]
    Catalog {
        /// First load failure.
        #[source]
        source: LoadError,
    },
    /// An endpoint table was rejected at mount time.
    #[error("failed to mount endpoints: {source}")]
    Dispatch {
        /// Registration failure.
        #[source]
        source: DispatchError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    catalog: Arc<PluginCatalog>,
    dispatcher: Arc<Dispatcher>,
    heartbeat: Arc<Heartbeat>,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the loaded catalog.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    /// Accessor for the request dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Accessor for the liveness heartbeat.
    #[must_use]
    pub const fn heartbeat(&self) -> &Arc<Heartbeat> {
        &self.heartbeat
    }

    /// Accessor for the health reporter.
    #[must_use]
    pub const fn reporter(&self) -> &Arc<dyn HealthReporter> {
        &self.reporter
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .field("facets", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

/// Bootstraps the daemon with process-backed entry points.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first failing stage.
pub fn bootstrap(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    bootstrap_with(loader, reporter, |config: &Config| {
        ProcessResolver::new(Duration::from_secs(config.plugin_timeout_secs()))
    })
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// `resolver` builds the module resolver from the loaded configuration.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first failing stage. The reporter sees
/// the failure before it is returned.
pub fn bootstrap_with<R, F>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    resolver: F,
) -> Result<Daemon, BootstrapError>
where
    R: ModuleResolver,
    F: FnOnce(&Config) -> R,
{
    reporter.bootstrap_starting();
    match assemble(loader, &*reporter, resolver) {
        Ok((config, catalog, dispatcher, heartbeat, telemetry)) => {
            reporter.bootstrap_succeeded(&config);
            Ok(Daemon {
                config,
                catalog,
                dispatcher,
                heartbeat,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

type Assembled = (
    Config,
    Arc<PluginCatalog>,
    Arc<Dispatcher>,
    Arc<Heartbeat>,
    TelemetryHandle,
);

fn assemble<R, F>(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    resolver: F,
) -> Result<Assembled, BootstrapError>
where
    R: ModuleResolver,
    F: FnOnce(&Config) -> R,
{
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    config
        .validate()
        .map_err(|source| BootstrapError::Validation { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;

    let plugin_root = config.plugin_root();
    let catalog = PluginCatalog::load(plugin_root.as_std_path(), &resolver(&config))
        .map_err(|source| BootstrapError::Catalog { source })?;
    reporter.catalog_loaded(catalog.root(), catalog.len());
    let shared_catalog = Arc::new(catalog);

    let heartbeat = Arc::new(Heartbeat::new(Duration::from_secs(config.heartbeat_secs())));
    let invoker = FacetInvoker::new(Arc::clone(&shared_catalog), authorizer_for(&config));
    let dispatcher = build_dispatcher(
        invoker,
        Arc::clone(&heartbeat),
        config.deploy_ver(),
        ErrorTranslator::default(),
    )
    .map_err(|source| BootstrapError::Dispatch { source })?;

    Ok((
        config,
        shared_catalog,
        Arc::new(dispatcher),
        heartbeat,
        telemetry,
    ))
}

fn authorizer_for(config: &Config) -> Arc<dyn Authorizer> {
    let tokens = config.auth_tokens();
    if tokens.is_empty() {
        warn!(
            target: AUTH_TARGET,
            "no bearer tokens configured; admitting every request"
        );
        Arc::new(AllowAll)
    } else {
        Arc::new(StaticTokenAuthorizer::new(tokens))
    }
}
