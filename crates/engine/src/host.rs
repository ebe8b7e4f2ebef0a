// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The host-state supervisor.
//!
//! One supervisor task per instance assigned to this host, each driving
//! its container toward the scheduler-authored desired lifecycle: start,
//! attach, pause, resume, stop. A supervisor that loses the coordination
//! service detaches, parking the live container in the passive cache,
//! instead of tearing down work that is still healthy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corral_coord::{client, paths, CoordError, Coordinator};
use corral_core::{Clock, DesiredLifecycle, HostId, HostState, InstanceState, StateId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::handler::{ContainerHandler, ExitWatch};
use crate::listener::{self, Listener, Spawner};
use crate::passive::PassiveThreads;
use crate::states;

/// Which of the supervisor's wait conditions fired.
enum Wake {
    /// A desired- or actual-state watch fired; re-read and reconcile.
    Record,
    /// The container stopped at the reported time.
    Exited(Option<DateTime<Utc>>),
    Cancelled,
}

/// Supervisor for the instances assigned to one host.
///
/// Implements [`Spawner`] for the host's instances path: the framework
/// spawns one [`supervise`](Self::supervise) task per desired-state
/// record and the post hook tears down orphaned passive entries.
pub struct HostStateListener<H, C> {
    host_id: HostId,
    handler: Arc<H>,
    clock: C,
    conn: Mutex<Option<Arc<dyn Coordinator>>>,
    passive: PassiveThreads,
    live: AtomicUsize,
}

impl<H, C> HostStateListener<H, C>
where
    H: ContainerHandler,
    C: Clock,
{
    pub fn new(host_id: impl Into<HostId>, handler: Arc<H>, clock: C) -> Self {
        Self {
            host_id: host_id.into(),
            handler,
            clock,
            conn: Mutex::new(None),
            passive: PassiveThreads::default(),
            live: AtomicUsize::new(0),
        }
    }

    fn conn(&self) -> Option<Arc<dyn Coordinator>> {
        self.conn.lock().clone()
    }

    /// Drive one instance until it terminates, detaches, or is cancelled.
    async fn supervise(&self, cancel: CancellationToken, node: &str) {
        let Some(conn) = self.conn() else { return };

        // check valid state id
        let state_id = match node.parse::<StateId>() {
            Ok(id) => id,
            Err(err) => {
                warn!(state_id = node, error = %err, "deleting invalid state id");
                let path = paths::host_state(&self.host_id, node);
                match conn.delete(&path).await {
                    Ok(()) | Err(CoordError::NoNode) => {}
                    Err(err) => {
                        error!(state_id = node, error = %err, "could not delete invalid state id");
                    }
                }
                return;
            }
        };

        let desired_path = paths::host_state(&self.host_id, node);
        let actual_path = paths::service_state(&state_id.service_id, node);

        // container information from the passive cache or the service record
        let Some((mut actual, mut exited)) = self.load_thread(conn.as_ref(), &state_id, node).await
        else {
            return;
        };

        loop {
            // one-shot watch on the desired-state record
            let (desired, desired_watch) =
                match client::get_json_w::<HostState>(conn.as_ref(), &desired_path).await {
                    Ok((record, _version, watch)) => (record, watch),
                    Err(CoordError::NoNode) => {
                        debug!(state_id = %state_id, "desired state was removed, stopping instance");
                        terminate(conn.as_ref(), self.handler.as_ref(), &state_id, exited.take())
                            .await;
                        return;
                    }
                    Err(err) => {
                        warn!(
                            state_id = %state_id,
                            error = %err,
                            "could not watch desired state, detaching from container"
                        );
                        self.detach(node, actual, exited.take());
                        return;
                    }
                };

            // the actual-state record must keep existing once written
            let (present, actual_watch) = match conn.exists_w(&actual_path).await {
                Ok(v) => v,
                Err(err) => {
                    warn!(
                        state_id = %state_id,
                        error = %err,
                        "could not watch instance state, detaching from container"
                    );
                    self.detach(node, actual, exited.take());
                    return;
                }
            };
            if !present && actual.is_some() {
                debug!(state_id = %state_id, "instance state was removed, stopping instance");
                terminate(conn.as_ref(), self.handler.as_ref(), &state_id, exited.take()).await;
                return;
            }

            // try to attach to a container still up from a previous run
            if exited.is_none() {
                if let Some(known) = actual.as_ref() {
                    exited = match self
                        .handler
                        .attach_container(known, &state_id.service_id, state_id.instance_id)
                        .await
                    {
                        Ok(watch) => watch,
                        Err(err) => {
                            error!(
                                state_id = %state_id,
                                error = %err,
                                "could not attach to container, stopping instance"
                            );
                            terminate(conn.as_ref(), self.handler.as_ref(), &state_id, None).await;
                            return;
                        }
                    };
                }
            }

            match desired.desired {
                DesiredLifecycle::Run => {
                    if exited.is_none() {
                        // container is not running, start it
                        let (started, exit_watch) = match self
                            .handler
                            .start_container(&cancel, &state_id.service_id, state_id.instance_id)
                            .await
                        {
                            Ok(v) => v,
                            Err(err) => {
                                error!(
                                    state_id = %state_id,
                                    error = %err,
                                    "could not start container, stopping instance"
                                );
                                terminate(conn.as_ref(), self.handler.as_ref(), &state_id, None)
                                    .await;
                                return;
                            }
                        };
                        actual = Some(started);
                        exited = Some(exit_watch);
                        if !self.record(conn.as_ref(), &state_id, node, &mut actual, &mut exited).await
                        {
                            return;
                        }
                        debug!(state_id = %state_id, "started container");
                    } else if actual.as_ref().is_some_and(|s| s.paused) {
                        // resume the paused container
                        if let Err(err) = self
                            .handler
                            .resume_container(&state_id.service_id, state_id.instance_id)
                            .await
                        {
                            error!(
                                state_id = %state_id,
                                error = %err,
                                "could not resume paused container, stopping instance"
                            );
                            terminate(conn.as_ref(), self.handler.as_ref(), &state_id, exited.take())
                                .await;
                            return;
                        }
                        if let Some(state) = actual.as_mut() {
                            state.paused = false;
                        }
                        if !self.record(conn.as_ref(), &state_id, node, &mut actual, &mut exited).await
                        {
                            return;
                        }
                        debug!(state_id = %state_id, "resumed paused container");
                    }
                }
                DesiredLifecycle::Pause => {
                    if exited.is_some() && actual.as_ref().is_some_and(|s| !s.paused) {
                        // container is running unpaused, pause it
                        if let Err(err) = self
                            .handler
                            .pause_container(&state_id.service_id, state_id.instance_id)
                            .await
                        {
                            error!(
                                state_id = %state_id,
                                error = %err,
                                "could not pause running container, stopping instance"
                            );
                            terminate(conn.as_ref(), self.handler.as_ref(), &state_id, exited.take())
                                .await;
                            return;
                        }
                        if let Some(state) = actual.as_mut() {
                            state.paused = true;
                        }
                        if !self.record(conn.as_ref(), &state_id, node, &mut actual, &mut exited).await
                        {
                            return;
                        }
                        debug!(state_id = %state_id, "paused running container");
                    }
                }
                DesiredLifecycle::Stop => {
                    debug!(state_id = %state_id, "stopping instance");
                    terminate(conn.as_ref(), self.handler.as_ref(), &state_id, exited.take()).await;
                    return;
                }
                DesiredLifecycle::Unknown => {
                    warn!(state_id = %state_id, "unknown desired state");
                }
            }

            let wake = tokio::select! {
                _ = desired_watch => Wake::Record,
                _ = actual_watch => Wake::Record,
                stopped = wait_exit(&mut exited) => Wake::Exited(stopped),
                _ = cancel.cancelled() => Wake::Cancelled,
            };

            if let Wake::Exited(stopped) = wake {
                exited = None;
                if let Some(state) = actual.as_mut() {
                    state.terminated = Some(stopped.unwrap_or_else(|| self.clock.now_utc()));
                }
                if !self.record(conn.as_ref(), &state_id, node, &mut actual, &mut exited).await {
                    return;
                }
            }

            // cancellation takes precedence over any other ready event
            if cancel.is_cancelled() {
                debug!(state_id = %state_id, "listener shutting down, detaching from container");
                self.detach(node, actual, exited.take());
                return;
            }
        }
    }

    /// Load the instance's bookkeeping: the passive cache first, then the
    /// authoritative record. A missing record means the instance has
    /// never been provisioned; this supervisor creates it on first
    /// start. Returns `None` when the record cannot be read at all.
    async fn load_thread(
        &self,
        conn: &dyn Coordinator,
        state_id: &StateId,
        node: &str,
    ) -> Option<(Option<InstanceState>, Option<ExitWatch>)> {
        if let Some(thread) = self.passive.take(node) {
            debug!(state_id = %state_id, "resuming cached instance");
            return Some((Some(thread.state), thread.exited));
        }
        let path = paths::service_state(&state_id.service_id, node);
        match client::get_json::<InstanceState>(conn, &path).await {
            Ok((state, _version)) => Some((Some(state), None)),
            Err(CoordError::NoNode) => Some((None, None)),
            Err(err) => {
                error!(state_id = %state_id, error = %err, "could not look up instance state, exiting");
                None
            }
        }
    }

    /// Persist the actual-state record. A write failure detaches the
    /// supervisor (the container is preserved) and reports `false`.
    async fn record(
        &self,
        conn: &dyn Coordinator,
        state_id: &StateId,
        node: &str,
        actual: &mut Option<InstanceState>,
        exited: &mut Option<ExitWatch>,
    ) -> bool {
        let Some(state) = actual.as_ref() else { return true };
        match states::write_instance(conn, state_id, state).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    state_id = %state_id,
                    error = %err,
                    "could not record instance state, detaching from container"
                );
                self.detach(node, actual.take(), exited.take());
                false
            }
        }
    }

    /// Park the container for the next supervisor spawned for this id.
    fn detach(&self, node: &str, actual: Option<InstanceState>, exited: Option<ExitWatch>) {
        // nothing started yet means nothing worth preserving
        let Some(state) = actual else { return };
        debug!(state_id = node, "caching running instance");
        self.passive.save(node, state, exited);
    }
}

/// Stop a running container and clean up both of its records.
async fn terminate<H: ContainerHandler>(
    conn: &dyn Coordinator,
    handler: &H,
    state_id: &StateId,
    exited: Option<ExitWatch>,
) {
    if let Err(err) = handler.stop_container(&state_id.service_id, state_id.instance_id).await {
        error!(state_id = %state_id, error = %err, "could not stop service instance");
    } else if let Some(watch) = exited {
        if let Ok(stopped) = watch.await {
            debug!(state_id = %state_id, terminated = %stopped, "container has exited");
        }
    }
    if let Err(err) = states::delete_state(conn, state_id).await {
        error!(state_id = %state_id, error = %err, "could not delete state for stopped instance");
    }
}

async fn wait_exit(exited: &mut Option<ExitWatch>) -> Option<DateTime<Utc>> {
    match exited.as_mut() {
        // a dropped sender still means the container is gone
        Some(watch) => watch.await.ok(),
        None => std::future::pending().await,
    }
}

#[async_trait]
impl<H, C> Spawner for HostStateListener<H, C>
where
    H: ContainerHandler,
    C: Clock,
{
    fn set_conn(&self, conn: Arc<dyn Coordinator>) {
        *self.conn.lock() = Some(conn);
    }

    fn path(&self) -> String {
        paths::host_instances(&self.host_id)
    }

    fn pre(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    async fn spawn(&self, cancel: CancellationToken, node: &str) {
        self.supervise(cancel, node).await;
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    fn post(&self, active: &HashSet<String>) {
        let Some(conn) = self.conn() else { return };
        for (id, thread) in self.passive.drain_orphans(active) {
            // cache keys are ids that already parsed at spawn time
            let Ok(state_id) = id.parse::<StateId>() else { continue };
            warn!(state_id = %id, "terminating orphaned instance");
            let conn = conn.clone();
            let handler = self.handler.clone();
            tokio::spawn(async move {
                terminate(conn.as_ref(), handler.as_ref(), &state_id, thread.exited).await;
            });
        }
    }
}

#[async_trait]
impl<H, C> Listener for HostStateListener<H, C>
where
    H: ContainerHandler,
    C: Clock,
{
    async fn listen(self: Arc<Self>, shutdown: CancellationToken, conn: Arc<dyn Coordinator>) {
        listener::listen(shutdown, conn, self).await;
    }

    async fn shutdown(self: Arc<Self>) {
        let live = self.live.load(Ordering::SeqCst);
        if live > 0 {
            warn!(live, "shutting down with supervisors still active");
        }
        // final teardown decommissions whatever is still cached
        let Some(conn) = self.conn() else { return };
        for (id, thread) in self.passive.drain_all() {
            let Ok(state_id) = id.parse::<StateId>() else { continue };
            debug!(state_id = %id, "stopping cached instance at shutdown");
            terminate(conn.as_ref(), self.handler.as_ref(), &state_id, thread.exited).await;
        }
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
