//! Built-in defaults applied when no configuration layer sets a value.

use crate::logging::LogFormat;

/// Default HTTP prefix under which every endpoint is mounted.
pub const DEFAULT_ROUTE_BASE: &str = "/api/v1";

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 64000;

/// Default directory scanned for plugin groups.
pub const DEFAULT_PLUGIN_ROOT: &str = "./polys";

/// Heartbeat staleness window in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 10;

/// Interval between status reports in seconds.
pub const DEFAULT_STATUS_REPORT_SECS: u64 = 3600;

/// Time budget for a single process-backed entry point call.
pub const DEFAULT_PLUGIN_TIMEOUT_SECS: u64 = 30;

/// Longest accepted value for any interval setting: one year.
pub const MAX_INTERVAL_SECS: u64 = 31_536_000;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the daemon.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
