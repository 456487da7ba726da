//! Unit tests for the daemon bootstrap utilities.

use std::sync::Arc;

use polyapi_config::Config;
use polyapi_plugins::{RequestEnvelope, StaticModules};
use rstest::rstest;
use serde_json::json;

use crate::{BootstrapError, DEFAULT_AUTH_DELAY, StaticConfigLoader, bootstrap_with};

use super::support::{
    FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader, sample_modules,
};

#[rstest]
fn bootstrap_reports_lifecycle_in_order() {
    let loader = TestConfigLoader::new();
    let reporter = Arc::new(RecordingHealthReporter::default());

    let daemon = bootstrap_with(&loader, reporter.clone(), |_| sample_modules())
        .expect("bootstrap should succeed");

    assert_eq!(daemon.catalog().len(), 1);
    assert_eq!(
        reporter.events(),
        vec![
            HealthEvent::BootstrapStarting,
            HealthEvent::CatalogLoaded { facets: 1 },
            HealthEvent::BootstrapSucceeded,
        ]
    );
}

#[rstest]
fn configuration_failures_are_reported() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&FailingConfigLoader, reporter.clone(), |_| sample_modules())
        .expect_err("bootstrap should fail");

    assert!(matches!(error, BootstrapError::Configuration { .. }));
    let events = reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert!(matches!(events.last(), Some(HealthEvent::BootstrapFailed(_))));
}

#[rstest]
#[case::heartbeat(Config { heartbeat_secs: Some(0), ..Config::default() })]
#[case::route_base(Config { route_base: Some(String::from("api")), ..Config::default() })]
#[case::status_report(Config { status_report_secs: Some(u64::MAX), ..Config::default() })]
fn invalid_configuration_stops_before_the_catalog(#[case] config: Config) {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&StaticConfigLoader::new(config), reporter.clone(), |_| {
        sample_modules()
    })
    .expect_err("validation should fail");

    assert!(matches!(error, BootstrapError::Validation { .. }));
    assert!(
        !reporter
            .events()
            .iter()
            .any(|event| matches!(event, HealthEvent::CatalogLoaded { .. }))
    );
}

#[rstest]
fn unresolvable_entry_points_abort_bootstrap() {
    let loader = TestConfigLoader::new();
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&loader, reporter, |_| StaticModules::new())
        .expect_err("catalog should fail");

    assert!(matches!(error, BootstrapError::Catalog { .. }));
}

#[rstest]
fn resolver_sees_the_loaded_configuration() {
    let loader = TestConfigLoader::with_overrides(Config {
        plugin_timeout_secs: Some(7),
        ..Config::default()
    });
    let reporter = Arc::new(RecordingHealthReporter::default());
    let mut seen = None;

    bootstrap_with(&loader, reporter, |config| {
        seen = Some(config.plugin_timeout_secs());
        sample_modules()
    })
    .expect("bootstrap should succeed");

    assert_eq!(seen, Some(7));
}

#[rstest]
fn bootstrapped_dispatcher_serves_facets_and_health() {
    let loader = TestConfigLoader::with_overrides(Config {
        deploy_ver: Some(9),
        ..Config::default()
    });
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&loader, reporter, |_| sample_modules())
        .expect("bootstrap should succeed");
    let dispatcher = daemon.dispatcher();

    let invoice = RequestEnvelope::new()
        .with_body(json!({"amount": 3}))
        .with_param("facet", "billing.invoice");
    let outcome = dispatcher
        .dispatch("POST", "polyform", &invoice)
        .expect("facet call succeeds");
    assert_eq!(outcome.status.as_u16(), 200);
    assert_eq!(outcome.body, json!({"status": "success", "amount": 3, "total": 3}));

    let detail = RequestEnvelope::new().with_param("detail", "true");
    let health = dispatcher
        .dispatch("GET", "health", &detail)
        .expect("health succeeds");
    assert_eq!(health.body["version"], json!(9));
    assert_eq!(dispatcher.requests_served(), 2);
}

#[rstest]
fn configured_tokens_guard_the_facets() {
    let loader = TestConfigLoader::with_overrides(Config {
        auth_tokens: Some(String::from("secret")),
        ..Config::default()
    });
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&loader, reporter, |_| sample_modules())
        .expect("bootstrap should succeed");

    let anonymous = RequestEnvelope::new()
        .with_body(json!({"amount": 1}))
        .with_param("facet", "billing.invoice");
    let rejected = daemon
        .dispatcher()
        .dispatch("POST", "polyform", &anonymous)
        .expect("auth failure is translated");
    assert_eq!(rejected.status.as_u16(), 401);
    assert_eq!(rejected.delay, Some(DEFAULT_AUTH_DELAY));

    let bearer = anonymous.with_header("authorization", "Bearer secret");
    let accepted = daemon
        .dispatcher()
        .dispatch("POST", "polyform", &bearer)
        .expect("facet call succeeds");
    assert_eq!(accepted.status.as_u16(), 200);
}
