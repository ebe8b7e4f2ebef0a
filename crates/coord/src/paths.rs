// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination-service path layout.
//!
//! Desired state is host-indexed, actual state is service-indexed, and the
//! same state id names the node on both sides.

use corral_core::{HostId, ServiceId};

/// Parent of a host's desired-state records: `/hosts/<hostID>/instances`.
pub fn host_instances(host_id: &HostId) -> String {
    format!("/hosts/{}/instances", host_id)
}

/// A single desired-state record.
pub fn host_state(host_id: &HostId, state_id: &str) -> String {
    format!("/hosts/{}/instances/{}", host_id, state_id)
}

/// A single actual-state record: `/services/<serviceID>/<stateID>`.
pub fn service_state(service_id: &ServiceId, state_id: &str) -> String {
    format!("/services/{}/{}", service_id, state_id)
}

/// Parent of a host's pending container actions.
pub fn host_actions(host_id: &HostId) -> String {
    format!("/hosts/{}/actions", host_id)
}

/// A single container action node.
pub fn host_action(host_id: &HostId, name: &str) -> String {
    format!("/hosts/{}/actions/{}", host_id, name)
}
