//! Behavioural tests for configuration layering.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use polyapi_config::{Config, DEFAULT_PORT, DEFAULT_ROUTE_BASE, default_log_filter};

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("polyapid")]),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
        }
    }

    fn write_config(&self, toml: &str) {
        let path = self.temp_dir.path().join("polyapi.toml");
        if let Err(error) = fs::write(&path, toml) {
            panic!("failed to write configuration: {error}");
        }
        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }
        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => *self.loaded.borrow_mut() = Some(config),
            Err(error) => *self.error.borrow_mut() = Some(error.to_string()),
        }
    }

    fn loaded(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the route base to \"{base}\"")]
fn given_route_base_file(harness: &Harness, base: String) {
    harness.write_config(&format!("route_base = \"{base}\"\nport = 7000\n"));
}

#[when("the command line sets the port to {port}")]
fn when_cli_port(harness: &Harness, port: u16) {
    harness.push_cli_arg("--port");
    harness.push_cli_arg(port.to_string());
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("the route base resolves to \"{base}\"")]
fn then_route_base(harness: &Harness, base: String) {
    assert_eq!(harness.loaded().route_base(), base);
}

#[then("the port resolves to {port}")]
fn then_port(harness: &Harness, port: u16) {
    assert_eq!(harness.loaded().port(), port);
}

#[then("the built-in defaults apply")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.loaded();
    assert_eq!(config.route_base(), DEFAULT_ROUTE_BASE);
    assert_eq!(config.port(), DEFAULT_PORT);
    assert_eq!(config.log_filter(), default_log_filter());
    assert!(config.validate().is_ok());
}

#[scenario(path = "tests/features/configuration_layers.feature")]
fn configuration_layers(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[test]
fn malformed_config_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "port = not_a_number\n").expect("write malformed config");

    let args = vec![
        OsString::from("polyapid"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    assert!(!error.to_string().is_empty());
}
