// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The generic watch/spawn framework.
//!
//! [`listen`] watches one coordination-service path and keeps exactly one
//! supervisor task alive per child node; [`manage`] wraps it in a
//! reconnect loop so a lost connection restarts the whole listener with a
//! fresh one.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corral_coord::{Connect, CoordError, Coordinator};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before retrying a failed coordination connection.
const CONNECT_RETRY: Duration = Duration::from_secs(5);

/// Manages the spawning of individual supervisor tasks for the nodes
/// under a particular coordination-service path.
#[async_trait]
pub trait Spawner: Send + Sync + 'static {
    /// Install the coordination connection for this listen cycle.
    fn set_conn(&self, conn: Arc<dyn Coordinator>);

    /// Parent path whose children are the target of [`Spawner::spawn`].
    fn path(&self) -> String;

    /// Synchronous action run before each spawn (e.g. a liveness count).
    fn pre(&self);

    /// Supervise a single child node until it terminates or `cancel`
    /// fires.
    async fn spawn(&self, cancel: CancellationToken, node: &str);

    /// Post-iteration hook receiving the complete active set, for
    /// reconciling bookkeeping against the currently known children.
    fn post(&self, active: &HashSet<String>);
}

/// A reconciler that maintains supervisors over a persistent
/// coordination connection.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn listen(self: Arc<Self>, shutdown: CancellationToken, conn: Arc<dyn Coordinator>);

    /// Final cleanup, run once when the manage loop winds down.
    async fn shutdown(self: Arc<Self>);
}

/// Maintain the listener across connection loss: acquire a connection,
/// run [`Listener::listen`] until it returns, reconnect, repeat until
/// `shutdown` fires. Runs the listener's final cleanup exactly once on
/// the way out.
pub async fn manage<L: Listener>(
    shutdown: CancellationToken,
    connector: Arc<dyn Connect>,
    listener: Arc<L>,
) {
    while !shutdown.is_cancelled() {
        match connector.connect().await {
            Ok(conn) => {
                info!("acquired a coordination service connection");
                listener.clone().listen(shutdown.clone(), conn).await;
            }
            Err(err) => {
                warn!(error = %err, "could not reach the coordination service");
                tokio::select! {
                    _ = tokio::time::sleep(CONNECT_RETRY) => {}
                    _ = shutdown.cancelled() => {}
                }
            }
        }
    }
    listener.shutdown().await;
}

/// Drive spawner tasks for the children of the spawner's path.
///
/// Loop invariant: every iteration arms fresh one-shot watches; a fired
/// or superseded watch handle is dropped, never reused. Returns only on
/// shutdown or on a connection-level error (the caller reconnects and
/// restarts). Never returns while a spawned task is still running.
pub async fn listen<S: Spawner>(
    shutdown: CancellationToken,
    conn: Arc<dyn Coordinator>,
    spawner: Arc<S>,
) {
    let path = spawner.path();
    let cancel = CancellationToken::new();
    let (exited_tx, mut exited_rx) = mpsc::unbounded_channel::<String>();
    let mut active: HashSet<String> = HashSet::new();

    spawner.set_conn(conn.clone());

    loop {
        // wait for the parent path to be available
        let (present, exists_watch) = match conn.exists_w(&path).await {
            Ok(v) => v,
            Err(err) => {
                error!(path = %path, error = %err, "could not watch path");
                break;
            }
        };

        // list the path's children, keeping a watch armed for changes
        let mut children = Vec::new();
        let mut event = exists_watch;
        if present {
            match conn.children_w(&path).await {
                Ok((ch, watch)) => {
                    children = ch;
                    event = watch;
                }
                Err(CoordError::NoNode) => {
                    // path was deleted between the two reads, go back to
                    // monitoring its existence
                    continue;
                }
                Err(err) => {
                    error!(path = %path, error = %err, "could not watch path children");
                    break;
                }
            }
        }

        // launch a supervisor for each new node
        for node in children {
            if !active.contains(&node) {
                debug!(path = %path, node = %node, "spawning a task for node");
                spawner.pre();
                active.insert(node.clone());
                let spawner = spawner.clone();
                let cancel = cancel.clone();
                let exited_tx = exited_tx.clone();
                tokio::spawn(async move {
                    spawner.spawn(cancel, &node).await;
                    let _ = exited_tx.send(node);
                });
            }
        }

        // reconcile bookkeeping against the active set (orphan cleanup)
        spawner.post(&active);

        tokio::select! {
            _ = event => {}
            Some(node) = exited_rx.recv() => {
                active.remove(&node);
            }
            _ = shutdown.cancelled() => {}
        }

        // shutdown takes precedence over any other ready event
        if shutdown.is_cancelled() {
            break;
        }
    }

    // stop spawning and wait for every task to acknowledge exit
    cancel.cancel();
    while !active.is_empty() {
        match exited_rx.recv().await {
            Some(node) => {
                active.remove(&node);
            }
            None => break,
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
