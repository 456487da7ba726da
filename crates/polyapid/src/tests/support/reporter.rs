//! Test double for [`HealthReporter`] that records structured events for assertions.
//!
//! The recorder captures lifecycle telemetry emitted during bootstrap and by
//! the heartbeat monitor so tests can validate observable events.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;

use polyapi_config::Config;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::heartbeat::StatusReport;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The catalog finished loading.
    CatalogLoaded { facets: usize },
    /// The HTTP listener was bound.
    ServerListening,
    /// The monitor published a status report.
    StatusReport(StatusReport),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn catalog_loaded(&self, _root: &Path, facets: usize) {
        self.record(HealthEvent::CatalogLoaded { facets });
    }

    fn server_listening(&self, _address: SocketAddr) {
        self.record(HealthEvent::ServerListening);
    }

    fn status_report(&self, report: &StatusReport) {
        self.record(HealthEvent::StatusReport(*report));
    }
}
