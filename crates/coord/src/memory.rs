// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process coordinator with ZooKeeper-like watch semantics.
//!
//! Backs tests and the daemon's standalone mode. Clones share the same
//! node table, so a clone passed to another task behaves like another
//! session against the same ensemble. `partition` simulates losing the
//! connection: every operation fails and all registered watches are
//! dropped, exactly what a real client does when its session dies.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::client::{Connect, Coordinator, Node, Watch, WatchEvent};
use crate::error::CoordError;

#[derive(Default)]
struct MemNode {
    data: Vec<u8>,
    version: u32,
}

#[derive(Default)]
struct Shared {
    nodes: BTreeMap<String, MemNode>,
    data_watches: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
    exists_watches: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
    child_watches: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
    partitioned: bool,
}

impl Shared {
    fn check_connected(&self) -> Result<(), CoordError> {
        if self.partitioned {
            Err(CoordError::ConnectionLost("partitioned".to_string()))
        } else {
            Ok(())
        }
    }

    fn fire_data(&mut self, path: &str, event: WatchEvent) {
        fire(&mut self.data_watches, path, event);
    }

    fn fire_exists(&mut self, path: &str, event: WatchEvent) {
        fire(&mut self.exists_watches, path, event);
    }

    fn fire_children(&mut self, path: &str) {
        fire(&mut self.child_watches, path, WatchEvent::ChildrenChanged);
    }

    /// Insert a node, materializing missing ancestors, firing watches for
    /// everything that came into existence.
    fn insert(&mut self, path: &str, data: Vec<u8>) {
        for ancestor in ancestors(path) {
            if !self.nodes.contains_key(ancestor) {
                self.nodes.insert(ancestor.to_string(), MemNode::default());
                self.fire_exists(ancestor, WatchEvent::Created);
                if let Some(parent) = parent(ancestor) {
                    self.fire_children(parent);
                }
            }
        }
        self.nodes.insert(path.to_string(), MemNode { data, version: 0 });
        self.fire_exists(path, WatchEvent::Created);
        if let Some(parent) = parent(path) {
            self.fire_children(parent);
        }
    }

    /// Remove a node and its descendants, firing watches for each removal.
    fn remove(&mut self, path: &str) {
        let prefix = format!("{}/", path);
        let removed: Vec<String> = self
            .nodes
            .keys()
            .filter(|k| k.as_str() == path || k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in removed {
            self.nodes.remove(&key);
            self.fire_data(&key, WatchEvent::Deleted);
            self.fire_exists(&key, WatchEvent::Deleted);
            // a children watch on the node itself also sees the deletion
            fire(&mut self.child_watches, &key, WatchEvent::Deleted);
        }
        if let Some(parent) = parent(path) {
            self.fire_children(parent);
        }
    }

    fn children_of(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" { "/".to_string() } else { format!("{}/", path) };
        self.nodes
            .keys()
            .filter_map(|k| {
                let rest = k.strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect()
    }
}

fn fire(map: &mut HashMap<String, Vec<oneshot::Sender<WatchEvent>>>, path: &str, event: WatchEvent) {
    if let Some(senders) = map.remove(path) {
        for tx in senders {
            // receiver may have been dropped when its loop re-armed
            let _ = tx.send(event);
        }
    }
}

fn register(map: &mut HashMap<String, Vec<oneshot::Sender<WatchEvent>>>, path: &str) -> Watch {
    let (tx, rx) = oneshot::channel();
    map.entry(path.to_string()).or_default().push(tx);
    rx
}

/// Proper ancestors of `path`, root first, excluding `path` itself.
fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut idx = 0;
    while let Some(next) = path[idx + 1..].find('/') {
        idx += next + 1;
        out.push(&path[..idx]);
    }
    out
}

fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn normalize(path: &str) -> Result<String, CoordError> {
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
        return Err(CoordError::ConnectionLost(format!("invalid path {:?}", path)));
    }
    Ok(path.to_string())
}

/// See module docs.
#[derive(Clone, Default)]
pub struct MemoryCoordinator {
    inner: Arc<Mutex<Shared>>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the coordination connection.
    ///
    /// While partitioned every operation returns `ConnectionLost` and all
    /// registered watches are dropped, waking their waiters.
    pub fn partition(&self, partitioned: bool) {
        let mut shared = self.inner.lock();
        shared.partitioned = partitioned;
        if partitioned {
            shared.data_watches.clear();
            shared.exists_watches.clear();
            shared.child_watches.clear();
        }
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn exists_w(&self, path: &str) -> Result<(bool, Watch), CoordError> {
        let path = normalize(path)?;
        let mut shared = self.inner.lock();
        shared.check_connected()?;
        let exists = shared.nodes.contains_key(&path);
        let watch = register(&mut shared.exists_watches, &path);
        Ok((exists, watch))
    }

    async fn children_w(&self, path: &str) -> Result<(Vec<String>, Watch), CoordError> {
        let path = normalize(path)?;
        let mut shared = self.inner.lock();
        shared.check_connected()?;
        if !shared.nodes.contains_key(&path) {
            return Err(CoordError::NoNode);
        }
        let children = shared.children_of(&path);
        let watch = register(&mut shared.child_watches, &path);
        Ok((children, watch))
    }

    async fn get_w(&self, path: &str) -> Result<(Node, Watch), CoordError> {
        let path = normalize(path)?;
        let mut shared = self.inner.lock();
        shared.check_connected()?;
        let node = shared.nodes.get(&path).ok_or(CoordError::NoNode)?;
        let node = Node { data: node.data.clone(), version: node.version };
        let watch = register(&mut shared.data_watches, &path);
        Ok((node, watch))
    }

    async fn get(&self, path: &str) -> Result<Node, CoordError> {
        let path = normalize(path)?;
        let shared = self.inner.lock();
        shared.check_connected()?;
        let node = shared.nodes.get(&path).ok_or(CoordError::NoNode)?;
        Ok(Node { data: node.data.clone(), version: node.version })
    }

    async fn create(&self, path: &str, data: Vec<u8>) -> Result<(), CoordError> {
        let path = normalize(path)?;
        let mut shared = self.inner.lock();
        shared.check_connected()?;
        if shared.nodes.contains_key(&path) {
            return Err(CoordError::NodeExists);
        }
        shared.insert(&path, data);
        Ok(())
    }

    async fn set(&self, path: &str, data: Vec<u8>, version: Option<u32>) -> Result<u32, CoordError> {
        let path = normalize(path)?;
        let mut shared = self.inner.lock();
        shared.check_connected()?;
        let node = shared.nodes.get_mut(&path).ok_or(CoordError::NoNode)?;
        if let Some(expected) = version {
            if node.version != expected {
                return Err(CoordError::BadVersion);
            }
        }
        node.data = data;
        node.version += 1;
        let new_version = node.version;
        shared.fire_data(&path, WatchEvent::DataChanged);
        Ok(new_version)
    }

    async fn delete(&self, path: &str) -> Result<(), CoordError> {
        let path = normalize(path)?;
        let mut shared = self.inner.lock();
        shared.check_connected()?;
        if !shared.nodes.contains_key(&path) {
            return Err(CoordError::NoNode);
        }
        shared.remove(&path);
        Ok(())
    }
}

#[async_trait]
impl Connect for MemoryCoordinator {
    async fn connect(&self) -> Result<Arc<dyn Coordinator>, CoordError> {
        let shared = self.inner.lock();
        shared.check_connected()?;
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
