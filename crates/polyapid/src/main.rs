//! `polyapid` binary: bootstrap, then serve until a termination signal.

use std::process::ExitCode;
use std::sync::Arc;

use polyapi_config::Config;
use polyapid::{
    BootstrapError, StructuredHealthReporter, SystemConfigLoader, bootstrap,
    initialise_telemetry, serve, shutdown_signal,
};
use tracing::{error, info};

const MAIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::main");

#[tokio::main]
async fn main() -> ExitCode {
    let reporter = Arc::new(StructuredHealthReporter::new());
    let daemon = match bootstrap(&SystemConfigLoader, reporter) {
        Ok(daemon) => daemon,
        Err(failure) => {
            report_early_failure(&failure);
            return ExitCode::FAILURE;
        }
    };

    if daemon.config().test_mode() {
        info!(target: MAIN_TARGET, "running in test mode");
    }

    match serve(daemon, shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!(target: MAIN_TARGET, error = %failure, "server stopped with an error");
            ExitCode::FAILURE
        }
    }
}

/// Logs configuration failures, which happen before telemetry is installed.
fn report_early_failure(failure: &BootstrapError) {
    if matches!(
        failure,
        BootstrapError::Configuration { .. } | BootstrapError::Validation { .. }
    ) && initialise_telemetry(&Config::default()).is_ok()
    {
        error!(target: MAIN_TARGET, error = %failure, "daemon bootstrap failed");
    }
}
