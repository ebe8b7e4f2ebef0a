// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The container runtime seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corral_core::{InstanceState, ServiceId};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Reports the time a container stopped. The sender side lives with the
/// runtime adapter; the receiver travels with whichever supervisor (or
/// passive-cache entry) currently owns the instance.
pub type ExitWatch = oneshot::Receiver<DateTime<Utc>>;

/// Errors from the container runtime adapter.
///
/// All of these are fatal for the affected instance: the supervisor tears
/// the instance down rather than retrying, leaving rescheduling to the
/// external scheduler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("container runtime error: {0}")]
    Runtime(String),

    #[error("no container for instance {0}")]
    NotFound(String),
}

/// Primitive container actions, keyed by (service, instance).
#[async_trait]
pub trait ContainerHandler: Send + Sync + 'static {
    /// Create and start a new container for the given service instance.
    /// Returns the new actual state and a channel that reports the time
    /// the container stops.
    async fn start_container(
        &self,
        cancel: &CancellationToken,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(InstanceState, ExitWatch), HandlerError>;

    /// Attach to an existing container for the service instance. Returns
    /// `None` if no container matches the known state or if it has
    /// already stopped.
    async fn attach_container(
        &self,
        state: &InstanceState,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<Option<ExitWatch>, HandlerError>;

    /// Pause a running container. Succeeds if the container has stopped
    /// or does not exist.
    async fn pause_container(&self, service_id: &ServiceId, instance_id: u32)
        -> Result<(), HandlerError>;

    /// Resume a paused container. Succeeds if the container has stopped
    /// or does not exist.
    async fn resume_container(
        &self,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(), HandlerError>;

    /// Stop the container if it exists and isn't already stopped.
    async fn stop_container(&self, service_id: &ServiceId, instance_id: u32)
        -> Result<(), HandlerError>;
}
