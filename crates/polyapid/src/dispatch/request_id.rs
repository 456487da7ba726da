//! Log correlation identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic hex request id source seeded from 32 random bits.
///
/// Ids are unique for the lifetime of the generator. They are not
/// unpredictable and must only be used to correlate log lines.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    /// Seeds a generator from the thread-local RNG.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(u64::from(rand::random::<u32>()))
    }

    /// Seeds a generator with a fixed starting value.
    #[must_use]
    pub const fn with_seed(seed: u64) -> Self {
        Self {
            next: AtomicU64::new(seed),
        }
    }

    /// Returns the next id as lower-case hex.
    pub fn next_id(&self) -> String {
        format!("{:x}", self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
