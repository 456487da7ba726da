//! Test harness utilities for the daemon bootstrap suites.

mod config_loader;
mod reporter;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader, sample_modules};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};
