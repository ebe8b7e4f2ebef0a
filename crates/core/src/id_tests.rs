// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn state_id_display_and_parse_are_inverse() {
    let id = StateId::new("h1", "svc-web", 3);
    let encoded = id.to_string();
    assert_eq!(encoded, "h1:svc-web:3");
    let parsed: StateId = encoded.parse().unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn state_id_parses_components() {
    let parsed: StateId = "west-04:billing:12".parse().unwrap();
    assert_eq!(parsed.host_id, "west-04");
    assert_eq!(parsed.service_id, "billing");
    assert_eq!(parsed.instance_id, 12);
}

#[parameterized(
    empty = { "" },
    one_segment = { "garbage" },
    two_segments = { "h1:svc" },
    four_segments = { "h1:svc:0:extra" },
    empty_host = { ":svc:0" },
    empty_service = { "h1::0" },
    non_numeric_instance = { "h1:svc:first" },
    negative_instance = { "h1:svc:-1" },
    empty_instance = { "h1:svc:" },
)]
fn malformed_state_ids_fail_to_parse(input: &str) {
    assert!(input.parse::<StateId>().is_err(), "{:?} should not parse", input);
}

#[test]
fn state_id_serde_round_trip() {
    let id = StateId::new("h1", "svc", 0);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"h1:svc:0\"");
    let back: StateId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn state_id_deserialize_rejects_garbage() {
    assert!(serde_json::from_str::<StateId>("\"not-a-state-id\"").is_err());
}

#[test]
fn id_newtypes_compare_with_str() {
    let host = HostId::new("h1");
    assert_eq!(host, "h1");
    assert_eq!(host.as_str(), "h1");
    assert!(!host.is_empty());
    assert!(HostId::new("").is_empty());

    let service: ServiceId = String::from("svc").into();
    assert_eq!(service, "svc");
}
