// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level integration specs: the manage loop end to end, from a
//! scheduler-written desired record to container actions, across a
//! coordination-service outage.

use std::sync::Arc;
use std::time::Duration;

use corral_coord::{client, paths, Connect, CoordError, MemoryCoordinator};
use corral_core::{DesiredLifecycle, FakeClock, HostState, InstanceState, StateId};
use corral_engine::test_support::FakeHandler;
use corral_engine::{manage, HostStateListener};
use tokio_util::sync::CancellationToken;

struct Stack {
    coord: MemoryCoordinator,
    handler: Arc<FakeHandler>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

fn start_stack() -> Stack {
    let coord = MemoryCoordinator::new();
    let clock = FakeClock::new();
    let handler = Arc::new(FakeHandler::new(clock.clone()));
    let listener = Arc::new(HostStateListener::new("h1", handler.clone(), clock));
    let shutdown = CancellationToken::new();
    let connector: Arc<dyn Connect> = Arc::new(coord.clone());
    let task = tokio::spawn(manage(shutdown.clone(), connector, listener));
    Stack { coord, handler, shutdown, task }
}

async fn set_desired(coord: &MemoryCoordinator, state_id: &StateId, desired: DesiredLifecycle) {
    let path = paths::host_state(&state_id.host_id, &state_id.to_string());
    let record = HostState::new(state_id, desired);
    match client::set_json(coord, &path, &record, None).await {
        Ok(_) => {}
        Err(CoordError::NoNode) => {
            client::create_json(coord, &path, &record).await.expect("create desired record")
        }
        Err(err) => panic!("could not write desired state: {}", err),
    }
}

async fn actual(coord: &MemoryCoordinator, state_id: &StateId) -> Option<InstanceState> {
    let path = paths::service_state(&state_id.service_id, &state_id.to_string());
    client::get_json::<InstanceState>(coord, &path).await.ok().map(|(state, _)| state)
}

/// Generous virtual-time waiter; tests run with a paused clock, so the
/// manage loop's reconnect delay elapses instantly.
async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test(start_paused = true)]
async fn containers_survive_a_coordination_outage() {
    let stack = start_stack();
    let sid = StateId::new("h1", "svc1", 0);

    set_desired(&stack.coord, &sid, DesiredLifecycle::Run).await;
    wait_for("container start", || async { actual(&stack.coord, &sid).await.is_some() }).await;
    assert_eq!(stack.handler.start_count(), 1);

    // the outage detaches supervisors; manage keeps retrying the connection
    stack.coord.partition(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(stack.handler.stops().is_empty(), "an outage must not stop live containers");
    assert!(stack.handler.running("svc1", 0));

    // on reconnect the same container is picked back up, not restarted
    stack.coord.partition(false);
    wait_for("reconciliation after reconnect", || async {
        // a fresh desired-state write proves the loop is live again
        set_desired(&stack.coord, &sid, DesiredLifecycle::Pause).await;
        actual(&stack.coord, &sid).await.is_some_and(|s| s.paused)
    })
    .await;
    assert_eq!(stack.handler.start_count(), 1, "reattachment must not start a new container");

    set_desired(&stack.coord, &sid, DesiredLifecycle::Stop).await;
    wait_for("teardown", || async { actual(&stack.coord, &sid).await.is_none() }).await;

    stack.shutdown.cancel();
    stack.task.await.expect("manage task");
}

#[tokio::test(start_paused = true)]
async fn manage_teardown_decommissions_cached_instances() {
    let stack = start_stack();
    let sid = StateId::new("h1", "svc1", 0);

    set_desired(&stack.coord, &sid, DesiredLifecycle::Run).await;
    wait_for("container start", || async { actual(&stack.coord, &sid).await.is_some() }).await;

    // shutdown cancels the supervisors (which detach) and then runs the
    // listener's final cleanup, which stops what is still cached
    stack.shutdown.cancel();
    stack.task.await.expect("manage task");

    assert_eq!(stack.handler.stops(), vec![("svc1".to_string(), 0)]);
    assert!(actual(&stack.coord, &sid).await.is_none());
}
