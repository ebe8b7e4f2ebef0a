// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;

use corral_core::InstanceState;

use super::*;

fn state(container_id: &str) -> InstanceState {
    InstanceState { container_id: container_id.to_string(), ..Default::default() }
}

#[test]
fn save_then_take_round_trips() {
    let threads = PassiveThreads::default();
    threads.save("h1:svc:0", state("ctr-a"), None);

    let thread = threads.take("h1:svc:0").expect("entry should be present");
    assert_eq!(thread.state.container_id, "ctr-a");
    assert!(thread.exited.is_none());

    // take removes the entry
    assert!(threads.take("h1:svc:0").is_none());
}

#[test]
fn drain_orphans_removes_exactly_the_missing_ids() {
    let threads = PassiveThreads::default();
    threads.save("h1:svc:0", state("a"), None);
    threads.save("h1:svc:1", state("b"), None);
    threads.save("h1:svc:2", state("c"), None);

    let current: HashSet<String> =
        ["h1:svc:0".to_string(), "h1:svc:2".to_string()].into_iter().collect();
    let orphans = threads.drain_orphans(&current);

    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].0, "h1:svc:1");
    assert_eq!(orphans[0].1.state.container_id, "b");

    // survivors are untouched
    assert_eq!(threads.len(), 2);
    assert!(threads.take("h1:svc:0").is_some());
    assert!(threads.take("h1:svc:2").is_some());
}

#[test]
fn drain_all_empties_the_cache() {
    let threads = PassiveThreads::default();
    threads.save("h1:svc:0", state("a"), None);
    threads.save("h1:svc:1", state("b"), None);

    let mut drained = threads.drain_all();
    drained.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].0, "h1:svc:0");
    assert_eq!(threads.len(), 0);
}

#[test]
fn save_replaces_an_existing_entry() {
    let threads = PassiveThreads::default();
    threads.save("h1:svc:0", state("old"), None);
    threads.save("h1:svc:0", state("new"), None);

    let thread = threads.take("h1:svc:0").expect("entry should be present");
    assert_eq!(thread.state.container_id, "new");
}
