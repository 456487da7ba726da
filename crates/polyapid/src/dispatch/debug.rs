//! Process-wide debug flags with per-call scoping.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Flag toggled by the `abac=log` request option.
pub const ABAC_FLAG: &str = "abac";

/// Why a flag is on: pinned by an operator, held by live scopes, or both.
#[derive(Debug, Default, Clone, Copy)]
struct FlagState {
    pinned: bool,
    scopes: usize,
}

impl FlagState {
    const fn is_on(self) -> bool {
        self.pinned || self.scopes > 0
    }
}

/// Shared set of enabled debug flags.
///
/// A flag stays enabled while it is pinned with [`DebugFlags::set`] or while
/// at least one [`DebugScope`] for it is alive.
#[derive(Debug, Clone, Default)]
pub struct DebugFlags {
    enabled: Arc<Mutex<BTreeMap<String, FlagState>>>,
}

impl DebugFlags {
    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, FlagState>> {
        self.enabled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports whether `flag` is enabled.
    #[must_use]
    pub fn is_set(&self, flag: &str) -> bool {
        self.lock().get(flag).is_some_and(|state| state.is_on())
    }

    /// Pins `flag` on, returning `true` when it was not already enabled.
    pub fn set(&self, flag: &str) -> bool {
        let mut flags = self.lock();
        let state = flags.entry(flag.to_owned()).or_default();
        let was_on = state.is_on();
        state.pinned = true;
        !was_on
    }

    /// Removes the pin on `flag`. Live scopes keep it enabled.
    pub fn clear(&self, flag: &str) {
        let mut flags = self.lock();
        if let Entry::Occupied(mut entry) = flags.entry(flag.to_owned()) {
            entry.get_mut().pinned = false;
            if !entry.get().is_on() {
                entry.remove();
            }
        }
    }

    /// Enables `flag` until the returned scope drops.
    ///
    /// Scopes nest and overlap: the flag goes off only when the last scope
    /// ends and no pin remains.
    #[must_use]
    pub fn scope(&self, flag: &str) -> DebugScope {
        self.lock().entry(flag.to_owned()).or_default().scopes += 1;
        DebugScope {
            flags: self.clone(),
            flag: flag.to_owned(),
        }
    }

    fn release(&self, flag: &str) {
        let mut flags = self.lock();
        if let Entry::Occupied(mut entry) = flags.entry(flag.to_owned()) {
            let state = entry.get_mut();
            state.scopes = state.scopes.saturating_sub(1);
            if !state.is_on() {
                entry.remove();
            }
        }
    }
}

/// Guard holding its flag on until dropped.
#[derive(Debug)]
pub struct DebugScope {
    flags: DebugFlags,
    flag: String,
}

impl DebugScope {
    /// Name of the held flag.
    #[must_use]
    pub const fn flag(&self) -> &str {
        self.flag.as_str()
    }
}

impl Drop for DebugScope {
    fn drop(&mut self) {
        self.flags.release(&self.flag);
    }
}
