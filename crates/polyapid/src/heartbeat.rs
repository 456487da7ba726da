//! Liveness heartbeat and the periodic status report.
//!
//! A monitor task beats every half heartbeat window. The health endpoint
//! reports the daemon stale once a full window passes without a beat, which
//! catches a wedged runtime even while the listener still accepts sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::dispatch::Dispatcher;
use crate::health::HealthReporter;
use crate::usage::{self, ResourceUsage};

const MONITOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::heartbeat");

/// Wall-clock heartbeat shared by the monitor and the health endpoint.
#[derive(Debug)]
pub struct Heartbeat {
    window: Duration,
    started: Instant,
    last_beat: AtomicU64,
}

impl Heartbeat {
    /// Creates a heartbeat that has not beaten yet.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            started: Instant::now(),
            last_beat: AtomicU64::new(0),
        }
    }

    /// Returns the staleness window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Records a beat now.
    pub fn beat(&self) {
        self.beat_at(unix_now());
    }

    /// Records a beat at `unix_secs`.
    pub fn beat_at(&self, unix_secs: u64) {
        self.last_beat.store(unix_secs, Ordering::Relaxed);
    }

    /// Returns the time of the last beat in Unix seconds.
    #[must_use]
    pub fn last_beat(&self) -> Option<u64> {
        match self.last_beat.load(Ordering::Relaxed) {
            0 => None,
            secs => Some(secs),
        }
    }

    /// Reports whether the last beat is older than the window.
    ///
    /// A heartbeat that never beat is not stale.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(unix_now())
    }

    /// Staleness check against an explicit clock reading.
    #[must_use]
    pub fn is_stale_at(&self, unix_secs: u64) -> bool {
        self.last_beat()
            .is_some_and(|last| last.saturating_add(self.window.as_secs()) < unix_secs)
    }

    /// Returns the time since the heartbeat was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Counters emitted by the periodic status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// Requests dispatched since start.
    pub requests_served: u64,
    /// Facets in the catalog.
    pub facets: usize,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// Worker threads driving the tokio runtime.
    pub runtime_workers: usize,
    /// Tasks alive on the tokio runtime.
    pub alive_tasks: usize,
    /// Process resource usage since the previous report, when available.
    pub usage: Option<ResourceUsage>,
}

/// Spawns the heartbeat monitor on the current tokio runtime.
///
/// The monitor beats every half window and hands a [`StatusReport`] to the
/// reporter every `report_every`. A `report_every` too long to schedule
/// disables the reports but not the heartbeat. It runs until aborted.
#[must_use]
pub fn spawn_monitor(
    heartbeat: Arc<Heartbeat>,
    dispatcher: Arc<Dispatcher>,
    facets: usize,
    report_every: Duration,
    reporter: Arc<dyn HealthReporter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(heartbeat.window() / 2);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_report = Instant::now().checked_add(report_every);
        if next_report.is_none() {
            tracing::warn!(
                target: MONITOR_TARGET,
                interval_secs = report_every.as_secs(),
                "status report interval out of range; status reports disabled"
            );
        }
        let mut last_usage = usage::sample();
        loop {
            ticker.tick().await;
            heartbeat.beat();
            let now = Instant::now();
            if next_report.is_some_and(|due| now >= due) {
                next_report = now.checked_add(report_every);
                let current_usage = usage::sample();
                let metrics = tokio::runtime::Handle::current().metrics();
                reporter.status_report(&StatusReport {
                    requests_served: dispatcher.requests_served(),
                    facets,
                    uptime_secs: heartbeat.uptime().as_secs(),
                    runtime_workers: metrics.num_workers(),
                    alive_tasks: metrics.num_alive_tasks(),
                    usage: current_usage
                        .zip(last_usage)
                        .map(|(current, previous)| current.since(&previous)),
                });
                last_usage = current_usage;
            }
        }
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
