// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read/write helpers for desired- and actual-state records.

use corral_coord::{paths, CoordError, Coordinator};
use corral_core::{InstanceState, StateId};
use tracing::error;

/// Attempts before giving up on a conditional write. The supervisor is
/// the only writer of actual-state records, so a conflict means external
/// cleanup is racing us; losing is handled by the caller's detach path.
const SET_ATTEMPTS: usize = 3;

/// Write the actual-state record, creating it on first start.
///
/// Conditional on the record's current version; on a stale-version
/// conflict the version is re-read and the write retried up to
/// [`SET_ATTEMPTS`] times.
pub async fn write_instance(
    conn: &dyn Coordinator,
    state_id: &StateId,
    state: &InstanceState,
) -> Result<(), CoordError> {
    let path = paths::service_state(&state_id.service_id, &state_id.to_string());
    let data = serde_json::to_vec(state)?;
    for _ in 0..SET_ATTEMPTS {
        match conn.get(&path).await {
            Ok(node) => match conn.set(&path, data.clone(), Some(node.version)).await {
                Ok(_) => return Ok(()),
                Err(CoordError::BadVersion) => continue,
                Err(err) => return Err(err),
            },
            Err(CoordError::NoNode) => match conn.create(&path, data.clone()).await {
                Ok(()) => return Ok(()),
                // created concurrently, retry as a set
                Err(CoordError::NodeExists) => continue,
                Err(err) => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
    Err(CoordError::BadVersion)
}

/// Delete both records for an instance. Missing nodes are fine (the
/// deletion may be the very thing that got us here); any other failure is
/// logged and the first one returned.
pub async fn delete_state(conn: &dyn Coordinator, state_id: &StateId) -> Result<(), CoordError> {
    let id = state_id.to_string();
    let mut result = Ok(());
    for path in [
        paths::host_state(&state_id.host_id, &id),
        paths::service_state(&state_id.service_id, &id),
    ] {
        match conn.delete(&path).await {
            Ok(()) | Err(CoordError::NoNode) => {}
            Err(err) => {
                error!(path = %path, error = %err, "could not delete state node");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
    }
    result
}

#[cfg(test)]
#[path = "states_tests.rs"]
mod tests;
