// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use corral_core::SystemClock;

#[test]
fn container_names_are_deterministic() {
    let name = DockerHandler::<SystemClock>::container_name(&"svc-web".into(), 3);
    assert_eq!(name, "corral-svc-web-3");
}

fn frame(stream: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

#[test]
fn demux_concatenates_framed_payloads() {
    let mut raw = frame(1, b"hello ");
    raw.extend(frame(2, b"stderr "));
    raw.extend(frame(1, b"world"));
    assert_eq!(demux_stream(&raw), b"hello stderr world".to_vec());
}

#[test]
fn demux_passes_unframed_output_through() {
    // tty-mode output has no headers; the first byte is printable
    let raw = b"plain terminal output".to_vec();
    assert_eq!(demux_stream(&raw), raw);
}

#[test]
fn demux_stops_at_a_truncated_frame() {
    let mut raw = frame(1, b"complete");
    let mut truncated = frame(1, b"this payload is cut off");
    truncated.truncate(12);
    raw.extend(truncated);
    assert_eq!(demux_stream(&raw), b"complete".to_vec());
}

#[test]
fn demux_of_empty_stream_is_empty() {
    assert!(demux_stream(&[]).is_empty());
}
