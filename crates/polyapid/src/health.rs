//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use polyapi_config::Config;

use crate::bootstrap::BootstrapError;
use crate::heartbeat::StatusReport;

/// Tracing target for lifecycle events.
const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the plugin catalog is loaded.
    fn catalog_loaded(&self, root: &Path, facets: usize);

    /// Invoked when the HTTP listener is bound.
    fn server_listening(&self, address: SocketAddr);

    /// Invoked by the heartbeat monitor on every report interval.
    fn status_report(&self, report: &StatusReport);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn catalog_loaded(&self, root: &Path, facets: usize) {
        (**self).catalog_loaded(root, facets);
    }

    fn server_listening(&self, address: SocketAddr) {
        (**self).server_listening(address);
    }

    fn status_report(&self, report: &StatusReport) {
        (**self).status_report(report);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen = %config.listen_address(),
            route_base = config.route_base(),
            plugin_root = %config.plugin_root(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            test_mode = config.test_mode(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn catalog_loaded(&self, root: &Path, facets: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "catalog_loaded",
            root = %root.display(),
            facets,
            "plugin catalog ready"
        );
    }

    fn server_listening(&self, address: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_listening",
            %address,
            "accepting HTTP requests"
        );
    }

    fn status_report(&self, report: &StatusReport) {
        tracing::info!(
            target: HEALTH_TARGET,
            r#type = "status-report",
            requests_served = report.requests_served,
            facets = report.facets,
            uptime_secs = report.uptime_secs,
            runtime_workers = report.runtime_workers,
            alive_tasks = report.alive_tasks,
            "status report"
        );
        if let Some(usage) = report.usage {
            tracing::info!(
                target: HEALTH_TARGET,
                r#type = "status-report-usage",
                user_cpu_us = usage.user_cpu_us,
                system_cpu_us = usage.system_cpu_us,
                minor_faults = usage.minor_faults,
                major_faults = usage.major_faults,
                swaps = usage.swaps,
                block_in = usage.block_in,
                block_out = usage.block_out,
                messages_sent = usage.messages_sent,
                messages_received = usage.messages_received,
                voluntary_switches = usage.voluntary_switches,
                involuntary_switches = usage.involuntary_switches,
                max_rss = usage.max_rss,
                "process resource usage since last report"
            );
        }
    }
}
