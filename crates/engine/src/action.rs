// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot container commands.
//!
//! A second instantiation of the watch/spawn framework: remote callers
//! publish [`Action`] nodes under a host's actions path, and the host's
//! [`ActionListener`] claims each node with a conditional write, runs the
//! command in the target container, and deletes the node. The claim step
//! means an action runs at most once even if two listeners race.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use corral_coord::{client, paths, CoordError, Coordinator};
use corral_core::HostId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::handler::HandlerError;
use crate::listener::{self, Listener, Spawner};

/// A command to run inside a container on a specific host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub host_id: HostId,
    pub container_id: String,
    pub command: Vec<String>,
    /// Set by the listener when it claims the action.
    pub started: bool,
}

/// Executes a claimed action against the local container runtime.
#[async_trait]
pub trait ActionHandler: Send + Sync + 'static {
    async fn run(&self, container_id: &str, command: &[String]) -> Result<Vec<u8>, HandlerError>;
}

/// Publish an action for `action.host_id`, returning the node name to
/// poll or delete.
pub async fn send_action(conn: &dyn Coordinator, action: &Action) -> Result<String, CoordError> {
    let name = uuid::Uuid::new_v4().to_string();
    let path = paths::host_action(&action.host_id, &name);
    client::create_json(conn, &path, action).await?;
    Ok(name)
}

/// Watches a host's actions path and runs each pending command once.
pub struct ActionListener<H> {
    host_id: HostId,
    handler: Arc<H>,
    conn: Mutex<Option<Arc<dyn Coordinator>>>,
}

impl<H: ActionHandler> ActionListener<H> {
    pub fn new(host_id: impl Into<HostId>, handler: Arc<H>) -> Self {
        Self { host_id: host_id.into(), handler, conn: Mutex::new(None) }
    }

    fn conn(&self) -> Option<Arc<dyn Coordinator>> {
        self.conn.lock().clone()
    }

    async fn run_action(&self, conn: &dyn Coordinator, node: &str) {
        let path = paths::host_action(&self.host_id, node);

        let (mut action, version) = match client::get_json::<Action>(conn, &path).await {
            Ok((action, version)) => (action, version),
            Err(CoordError::NoNode) => return,
            Err(err) => {
                warn!(action = node, error = %err, "could not read action");
                return;
            }
        };

        // action already claimed by an earlier listen cycle
        if action.started {
            return;
        }

        // claim before running so a racing listener backs off
        action.started = true;
        match client::set_json(conn, &path, &action, Some(version)).await {
            Ok(_) => {}
            Err(CoordError::BadVersion) | Err(CoordError::NoNode) => {
                debug!(action = node, "action claimed elsewhere");
                return;
            }
            Err(err) => {
                warn!(action = node, error = %err, "could not claim action");
                return;
            }
        }

        match self.handler.run(&action.container_id, &action.command).await {
            Ok(output) => {
                if !output.is_empty() {
                    debug!(
                        action = node,
                        container_id = %action.container_id,
                        output = %String::from_utf8_lossy(&output),
                        "action completed"
                    );
                }
            }
            Err(err) => {
                error!(
                    action = node,
                    container_id = %action.container_id,
                    error = %err,
                    "error running action"
                );
            }
        }

        match conn.delete(&path).await {
            Ok(()) | Err(CoordError::NoNode) => {}
            Err(err) => warn!(action = node, error = %err, "could not delete finished action"),
        }
    }
}

#[async_trait]
impl<H: ActionHandler> Spawner for ActionListener<H> {
    fn set_conn(&self, conn: Arc<dyn Coordinator>) {
        *self.conn.lock() = Some(conn);
    }

    fn path(&self) -> String {
        paths::host_actions(&self.host_id)
    }

    fn pre(&self) {}

    async fn spawn(&self, _cancel: CancellationToken, node: &str) {
        let Some(conn) = self.conn() else { return };
        self.run_action(conn.as_ref(), node).await;
    }

    fn post(&self, _active: &HashSet<String>) {}
}

#[async_trait]
impl<H: ActionHandler> Listener for ActionListener<H> {
    async fn listen(self: Arc<Self>, shutdown: CancellationToken, conn: Arc<dyn Coordinator>) {
        listener::listen(shutdown, conn, self).await;
    }

    async fn shutdown(self: Arc<Self>) {}
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
