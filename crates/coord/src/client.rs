// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`Coordinator`] trait: hierarchical nodes, versioned writes, and
//! one-shot watches.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::CoordError;

/// What changed under a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Created,
    Deleted,
    DataChanged,
    ChildrenChanged,
}

/// A one-shot watch handle.
///
/// Fires at most once; a fired or dropped handle must never be reused,
/// so every loop iteration arms a fresh one. The receiver resolving to `Err`
/// means the connection dropped the watch, which callers treat as a wakeup
/// (the next read reports the real condition).
pub type Watch = oneshot::Receiver<WatchEvent>;

/// Raw node payload plus its optimistic-concurrency version stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub data: Vec<u8>,
    pub version: u32,
}

/// Client for a hierarchical, strongly consistent coordination service
/// with ZooKeeper-like semantics.
///
/// All watch-arming reads register the watch atomically with the read.
/// `create` materializes missing intermediate nodes. `set` with
/// `Some(version)` fails with [`CoordError::BadVersion`] when the node has
/// moved past that version; `None` writes unconditionally.
#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    /// Check existence and watch for the next create/delete of `path`.
    async fn exists_w(&self, path: &str) -> Result<(bool, Watch), CoordError>;

    /// List children and watch for the next child addition/removal.
    async fn children_w(&self, path: &str) -> Result<(Vec<String>, Watch), CoordError>;

    /// Read a node and watch for its next data change or deletion.
    async fn get_w(&self, path: &str) -> Result<(Node, Watch), CoordError>;

    /// Read a node without arming a watch.
    async fn get(&self, path: &str) -> Result<Node, CoordError>;

    /// Create a node with the given payload.
    async fn create(&self, path: &str, data: Vec<u8>) -> Result<(), CoordError>;

    /// Write a node's payload, returning the new version.
    async fn set(&self, path: &str, data: Vec<u8>, version: Option<u32>) -> Result<u32, CoordError>;

    /// Delete a node.
    async fn delete(&self, path: &str) -> Result<(), CoordError>;
}

/// Produces fresh coordination connections for the outer manage loop.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn Coordinator>, CoordError>;
}

/// Read and deserialize a JSON node.
pub async fn get_json<T: DeserializeOwned>(
    conn: &dyn Coordinator,
    path: &str,
) -> Result<(T, u32), CoordError> {
    let node = conn.get(path).await?;
    let value = serde_json::from_slice(&node.data)?;
    Ok((value, node.version))
}

/// Read and deserialize a JSON node, arming a data watch.
pub async fn get_json_w<T: DeserializeOwned>(
    conn: &dyn Coordinator,
    path: &str,
) -> Result<(T, u32, Watch), CoordError> {
    let (node, watch) = conn.get_w(path).await?;
    let value = serde_json::from_slice(&node.data)?;
    Ok((value, node.version, watch))
}

/// Serialize and create a JSON node.
pub async fn create_json<T: Serialize>(
    conn: &dyn Coordinator,
    path: &str,
    value: &T,
) -> Result<(), CoordError> {
    let data = serde_json::to_vec(value)?;
    conn.create(path, data).await
}

/// Serialize and write a JSON node.
pub async fn set_json<T: Serialize>(
    conn: &dyn Coordinator,
    path: &str,
    value: &T,
    version: Option<u32>,
) -> Result<u32, CoordError> {
    let data = serde_json::to_vec(value)?;
    conn.set(path, data, version).await
}
