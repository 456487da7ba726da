//! Shared configuration for the polyapi daemon.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional TOML file (`--config-path` or `POLYAPI_CONFIG_PATH`), then
//! `POLYAPI_*` environment variables, then command-line flags. Every field is
//! optional in the merged document; the accessor methods apply the defaults
//! from the `defaults` module so callers never see an unset value.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::defaults::{
    DEFAULT_HEARTBEAT_SECS, DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_PLUGIN_ROOT,
    DEFAULT_PLUGIN_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_ROUTE_BASE, DEFAULT_STATUS_REPORT_SECS,
    MAX_INTERVAL_SECS, default_log_filter, default_log_format,
};
pub use self::logging::{LogFormat, LogFormatParseError};

/// Daemon configuration merged from every supported source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "POLYAPI")]
pub struct Config {
    /// HTTP prefix under which the endpoints are mounted.
    pub route_base: Option<String>,
    /// Host the HTTP listener binds to.
    pub host: Option<String>,
    /// Port the HTTP listener binds to.
    pub port: Option<u16>,
    /// Directory holding `group/facet` plugin trees.
    pub plugin_root: Option<Utf8PathBuf>,
    /// Heartbeat staleness window in seconds.
    pub heartbeat_secs: Option<u64>,
    /// Interval between status reports in seconds.
    pub status_report_secs: Option<u64>,
    /// Time budget for a single process-backed entry point call.
    pub plugin_timeout_secs: Option<u64>,
    /// Comma-separated bearer tokens accepted by the gate.
    pub auth_tokens: Option<String>,
    /// Deployment version reported by the health endpoint.
    pub deploy_ver: Option<u64>,
    /// `tracing` filter expression.
    pub log_filter: Option<String>,
    /// Log output format.
    pub log_format: Option<LogFormat>,
    /// Marks the process as running in test mode.
    pub test_mode: Option<bool>,
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any source fails to parse.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any source fails to parse.
    pub fn load_from_iter<I>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = OsString>,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// HTTP prefix, without a trailing slash.
    #[must_use]
    pub fn route_base(&self) -> &str {
        self.route_base
            .as_deref()
            .map_or(DEFAULT_ROUTE_BASE, |base| base.trim_end_matches('/'))
    }

    /// Bind host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Bind port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// `host:port` pair for the listener.
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    /// Root directory of the plugin tree.
    #[must_use]
    pub fn plugin_root(&self) -> Utf8PathBuf {
        self.plugin_root
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PLUGIN_ROOT))
    }

    /// Heartbeat staleness window in seconds.
    #[must_use]
    pub fn heartbeat_secs(&self) -> u64 {
        self.heartbeat_secs.unwrap_or(DEFAULT_HEARTBEAT_SECS)
    }

    /// Status report interval in seconds.
    #[must_use]
    pub fn status_report_secs(&self) -> u64 {
        self.status_report_secs.unwrap_or(DEFAULT_STATUS_REPORT_SECS)
    }

    /// Process entry point timeout in seconds.
    #[must_use]
    pub fn plugin_timeout_secs(&self) -> u64 {
        self.plugin_timeout_secs
            .unwrap_or(DEFAULT_PLUGIN_TIMEOUT_SECS)
    }

    /// Bearer tokens accepted by the static gate; empty when unset.
    #[must_use]
    pub fn auth_tokens(&self) -> Vec<String> {
        self.auth_tokens
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Deployment version reported by the health endpoint.
    #[must_use]
    pub fn deploy_ver(&self) -> u64 {
        self.deploy_ver.unwrap_or_default()
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }

    /// Whether the daemon runs in test mode.
    #[must_use]
    pub fn test_mode(&self) -> bool {
        self.test_mode.unwrap_or(false)
    }

    /// Rejects values the daemon cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.route_base();
        if !base.is_empty() && !base.starts_with('/') {
            return Err(ConfigError::RouteBase {
                value: base.to_owned(),
            });
        }
        [
            ("heartbeat_secs", self.heartbeat_secs()),
            ("status_report_secs", self.status_report_secs()),
            ("plugin_timeout_secs", self.plugin_timeout_secs()),
        ]
        .into_iter()
        .try_for_each(|(field, secs)| check_interval(field, secs))
    }
}

fn check_interval(field: &'static str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 {
        return Err(ConfigError::ZeroInterval { field });
    }
    if secs > MAX_INTERVAL_SECS {
        return Err(ConfigError::IntervalTooLong {
            field,
            max: MAX_INTERVAL_SECS,
        });
    }
    Ok(())
}

/// Semantic errors found after the configuration layers merged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The route base is not an absolute URL path.
    #[error("route_base must start with '/', got '{value}'")]
    RouteBase {
        /// Offending value.
        value: String,
    },
    /// An interval that drives a timer was set to zero.
    #[error("{field} must be greater than zero")]
    ZeroInterval {
        /// Name of the offending field.
        field: &'static str,
    },
    /// An interval exceeds the longest timer the daemon arms.
    #[error("{field} must not exceed {max} seconds")]
    IntervalTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Largest accepted value.
        max: u64,
    },
}
