// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired- and actual-state records stored on the coordination service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{HostId, ServiceId, StateId};

/// Target lifecycle value for a scheduled instance.
///
/// Written only by the scheduler. `Unknown` captures values this agent
/// does not recognize (e.g. from a newer scheduler); the supervisor logs
/// them and takes no action rather than crashing the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredLifecycle {
    Run,
    Pause,
    Stop,
    #[serde(other)]
    Unknown,
}

/// Desired-state record for one instance assigned to a host.
///
/// Lives at `/hosts/<hostID>/instances/<stateID>`. Created and mutated
/// only by the scheduler; the host agent reads and watches it. Deletion
/// is the authoritative signal to tear the instance down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostState {
    pub host_id: HostId,
    pub service_id: ServiceId,
    pub instance_id: u32,
    pub desired: DesiredLifecycle,
}

impl HostState {
    pub fn new(state_id: &StateId, desired: DesiredLifecycle) -> Self {
        Self {
            host_id: state_id.host_id.clone(),
            service_id: state_id.service_id.clone(),
            instance_id: state_id.instance_id,
            desired,
        }
    }

    pub fn state_id(&self) -> StateId {
        StateId::new(self.host_id.clone(), self.service_id.clone(), self.instance_id)
    }
}

/// Actual-state record for one running (or recently run) instance.
///
/// Lives at `/services/<serviceID>/<stateID>`. Created by the supervisor
/// the first time it starts a container, mutated on every transition, and
/// deleted when the instance is torn down. `terminated` stays `None` until
/// an exit is observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Container handle assigned by the runtime.
    pub container_id: String,
    /// Image the container was created from.
    pub image_id: String,
    pub paused: bool,
    pub started: Option<DateTime<Utc>>,
    pub terminated: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
