//! HTTP front-end for polyform facets.
//!
//! The daemon loads a [`polyapi_plugins::PluginCatalog`] once at start-up and
//! serves every facet under `{route_base}/polyform/{group.facet}`. A request
//! travels through three layers:
//!
//! 1. the [`Dispatcher`] assigns a request id, maps the HTTP verb to an
//!    [`Operation`] and calls the handler mounted for the path;
//! 2. the polyform handler asks the [`FacetInvoker`] to look the facet up,
//!    pass the [`Authorizer`] gate and run the entry point;
//! 3. handler errors go through the [`ErrorTranslator`], which fixes the
//!    status code and body. Internal faults are logged with their trace and
//!    rendered as a generic `500` by the transport.
//!
//! Facet code runs on tokio's blocking pool. No request mutates
//! process-wide state apart from the scoped `abac` debug flag, and entry
//! points receive their base directory explicitly instead of relying on the
//! working directory.
//!
//! Bootstrap follows the same shape as the rest of the daemon: configuration
//! through [`ConfigLoader`], structured telemetry, lifecycle events through
//! [`HealthReporter`], and a liveness [`Heartbeat`] exposed at
//! `{route_base}/health`.

mod auth;
mod bootstrap;
mod dispatch;
mod endpoints;
mod health;
mod heartbeat;
mod http;
mod invoker;
mod shutdown;
mod telemetry;
mod usage;

pub use auth::{AllowAll, Authorizer, StaticTokenAuthorizer};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap,
    bootstrap_with,
};
pub use dispatch::{
    ABAC_FLAG, CallContext, CapabilityTable, DEFAULT_AUTH_DELAY, DebugFlags, DebugScope,
    DispatchError, DispatchOutcome, Dispatcher, DispatcherBuilder, ErrorTranslator, Handler,
    HandlerReply, NOT_FOUND_MESSAGE, Operation, RequestIdGenerator, Translation,
    UNAUTHORIZED_MESSAGE,
};
pub use endpoints::{
    FACET_PARAM, HEALTH_PATH, POLYFORM_PATH, STALE_HEARTBEAT_MESSAGE, build_dispatcher,
    health_table, polyform_table,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use heartbeat::{Heartbeat, StatusReport, spawn_monitor};
pub use http::{INTERNAL_ERROR_MESSAGE, SERVER_NAME, ServeError, router, serve};
pub use invoker::FacetInvoker;
pub use shutdown::shutdown_signal;
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use usage::ResourceUsage;

#[cfg(test)]
mod tests;
