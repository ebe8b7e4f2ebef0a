// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! corral-coord: the coordination-service client seam.
//!
//! Production deployments implement [`Coordinator`] over their ZooKeeper
//! client; [`MemoryCoordinator`] backs tests and the daemon's standalone
//! mode with the same watch semantics.

pub mod client;
pub mod error;
pub mod memory;
pub mod paths;

pub use client::{
    create_json, get_json, get_json_w, set_json, Connect, Coordinator, Node, Watch, WatchEvent,
};
pub use error::CoordError;
pub use memory::MemoryCoordinator;
