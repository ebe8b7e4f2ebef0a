// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for coordination-service operations.

use thiserror::Error;

/// Errors returned by [`Coordinator`](crate::Coordinator) operations.
///
/// `NoNode` is the distinguished not-found condition: callers route it to
/// termination/cleanup paths, while every other variant is treated as a
/// transient or fatal connection problem.
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("node does not exist")]
    NoNode,

    #[error("node already exists")]
    NodeExists,

    #[error("version mismatch on conditional set")]
    BadVersion,

    #[error("malformed node payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("coordination service unavailable: {0}")]
    ConnectionLost(String),
}

impl CoordError {
    /// True for the expected "node not found" condition, which drives
    /// termination rather than error handling.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoordError::NoNode)
    }
}
