// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn desired_lifecycle_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&DesiredLifecycle::Run).unwrap(), "\"run\"");
    assert_eq!(serde_json::to_string(&DesiredLifecycle::Pause).unwrap(), "\"pause\"");
    assert_eq!(serde_json::to_string(&DesiredLifecycle::Stop).unwrap(), "\"stop\"");
}

#[test]
fn unrecognized_desired_value_maps_to_unknown() {
    // A newer scheduler may write values this agent does not know about.
    // They must deserialize (to Unknown) instead of failing the record read.
    let parsed: DesiredLifecycle = serde_json::from_str("\"drain\"").unwrap();
    assert_eq!(parsed, DesiredLifecycle::Unknown);
}

#[test]
fn host_state_round_trips_through_json() {
    let id = StateId::new("h1", "svc", 2);
    let record = HostState::new(&id, DesiredLifecycle::Pause);
    let json = serde_json::to_vec(&record).unwrap();
    let back: HostState = serde_json::from_slice(&json).unwrap();
    assert_eq!(back, record);
    assert_eq!(back.state_id(), id);
}

#[test]
fn instance_state_defaults_to_never_run() {
    let state = InstanceState::default();
    assert!(state.container_id.is_empty());
    assert!(!state.paused);
    assert!(state.started.is_none());
    assert!(state.terminated.is_none());
}
