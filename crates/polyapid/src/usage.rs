//! Process resource usage sampled for the status report.
//!
//! Counters come from `getrusage(RUSAGE_SELF)`. The monitor keeps the previous
//! sample and reports the difference, so each status report covers only the
//! interval since the last one.

/// Resource counters for the daemon process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    /// User CPU time in microseconds.
    pub user_cpu_us: i64,
    /// System CPU time in microseconds.
    pub system_cpu_us: i64,
    /// Page faults served without I/O.
    pub minor_faults: i64,
    /// Page faults that required I/O.
    pub major_faults: i64,
    /// Times the process was swapped out.
    pub swaps: i64,
    /// Block input operations.
    pub block_in: i64,
    /// Block output operations.
    pub block_out: i64,
    /// IPC messages sent.
    pub messages_sent: i64,
    /// IPC messages received.
    pub messages_received: i64,
    /// Voluntary context switches.
    pub voluntary_switches: i64,
    /// Involuntary context switches.
    pub involuntary_switches: i64,
    /// Peak resident set size as reported by the platform.
    pub max_rss: i64,
}

impl ResourceUsage {
    /// Counters accumulated between `earlier` and `self`.
    ///
    /// `max_rss` is a high-water mark rather than a counter, so the current
    /// peak is kept as is.
    #[must_use]
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            user_cpu_us: grown(self.user_cpu_us, earlier.user_cpu_us),
            system_cpu_us: grown(self.system_cpu_us, earlier.system_cpu_us),
            minor_faults: grown(self.minor_faults, earlier.minor_faults),
            major_faults: grown(self.major_faults, earlier.major_faults),
            swaps: grown(self.swaps, earlier.swaps),
            block_in: grown(self.block_in, earlier.block_in),
            block_out: grown(self.block_out, earlier.block_out),
            messages_sent: grown(self.messages_sent, earlier.messages_sent),
            messages_received: grown(self.messages_received, earlier.messages_received),
            voluntary_switches: grown(self.voluntary_switches, earlier.voluntary_switches),
            involuntary_switches: grown(self.involuntary_switches, earlier.involuntary_switches),
            max_rss: self.max_rss,
        }
    }
}

fn grown(now: i64, before: i64) -> i64 {
    now.saturating_sub(before).max(0)
}

/// Reads the current counters, or `None` when the platform cannot supply them.
#[cfg(unix)]
#[must_use]
pub fn sample() -> Option<ResourceUsage> {
    use std::io;
    use std::mem::MaybeUninit;

    let mut raw = MaybeUninit::<libc::rusage>::uninit();
    // SAFETY: `getrusage(2)` writes a whole `rusage` through the pointer,
    // which refers to storage of exactly that type.
    let result = unsafe { libc::getrusage(libc::RUSAGE_SELF, raw.as_mut_ptr()) };
    if result != 0 {
        tracing::debug!(
            target: concat!(env!("CARGO_PKG_NAME"), "::usage"),
            error = %io::Error::last_os_error(),
            "getrusage failed"
        );
        return None;
    }
    // SAFETY: the call succeeded, so every field was written.
    let usage = unsafe { raw.assume_init() };
    Some(ResourceUsage {
        user_cpu_us: micros(&usage.ru_utime),
        system_cpu_us: micros(&usage.ru_stime),
        minor_faults: i64::from(usage.ru_minflt),
        major_faults: i64::from(usage.ru_majflt),
        swaps: i64::from(usage.ru_nswap),
        block_in: i64::from(usage.ru_inblock),
        block_out: i64::from(usage.ru_oublock),
        messages_sent: i64::from(usage.ru_msgsnd),
        messages_received: i64::from(usage.ru_msgrcv),
        voluntary_switches: i64::from(usage.ru_nvcsw),
        involuntary_switches: i64::from(usage.ru_nivcsw),
        max_rss: i64::from(usage.ru_maxrss),
    })
}

/// Reads the current counters, or `None` when the platform cannot supply them.
#[cfg(not(unix))]
#[must_use]
pub const fn sample() -> Option<ResourceUsage> {
    None
}

#[cfg(unix)]
fn micros(time: &libc::timeval) -> i64 {
    i64::from(time.tv_sec)
        .saturating_mul(1_000_000)
        .saturating_add(i64::from(time.tv_usec))
}
