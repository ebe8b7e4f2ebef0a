// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bookkeeping for containers whose supervisor has detached.
//!
//! A supervisor that cannot currently talk to the coordination service
//! parks its container handle here instead of stopping live work; the
//! next supervisor spawned for the same state id picks the handle back
//! up. Ownership transfer goes through this map and nowhere else.

use std::collections::{HashMap, HashSet};

use corral_core::InstanceState;
use parking_lot::Mutex;

use crate::handler::ExitWatch;

/// A detached container: its last-known actual state and, when the
/// container was still running, the channel reporting its exit.
pub struct PassiveThread {
    pub state: InstanceState,
    pub exited: Option<ExitWatch>,
}

/// Map of detached containers, keyed by state id.
#[derive(Default)]
pub(crate) struct PassiveThreads {
    inner: Mutex<HashMap<String, PassiveThread>>,
}

impl PassiveThreads {
    /// Park a detached container for the next supervisor.
    pub fn save(&self, state_id: &str, state: InstanceState, exited: Option<ExitWatch>) {
        let mut inner = self.inner.lock();
        inner.insert(state_id.to_string(), PassiveThread { state, exited });
    }

    /// Atomically remove and return the entry for `state_id`.
    pub fn take(&self, state_id: &str) -> Option<PassiveThread> {
        self.inner.lock().remove(state_id)
    }

    /// Remove and return every entry whose state id is not among the
    /// current children, i.e. the true orphans.
    pub fn drain_orphans(&self, current: &HashSet<String>) -> Vec<(String, PassiveThread)> {
        let mut inner = self.inner.lock();
        let orphaned: Vec<String> =
            inner.keys().filter(|id| !current.contains(*id)).cloned().collect();
        orphaned
            .into_iter()
            .filter_map(|id| inner.remove(&id).map(|thread| (id, thread)))
            .collect()
    }

    /// Remove and return everything, for final cleanup.
    pub fn drain_all(&self) -> Vec<(String, PassiveThread)> {
        self.inner.lock().drain().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
#[path = "passive_tests.rs"]
mod tests;
