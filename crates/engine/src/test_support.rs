// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording container handler for tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corral_core::{Clock, FakeClock, InstanceState, ServiceId};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::handler::{ContainerHandler, ExitWatch, HandlerError};

/// One recorded adapter invocation, keyed by (service, instance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerCall {
    Start(String, u32),
    Attach(String, u32),
    Pause(String, u32),
    Resume(String, u32),
    Stop(String, u32),
}

/// In-memory [`ContainerHandler`] that records every call and lets tests
/// control container exits.
pub struct FakeHandler {
    clock: FakeClock,
    calls: Mutex<Vec<HandlerCall>>,
    exits: Mutex<HashMap<(String, u32), oneshot::Sender<DateTime<Utc>>>>,
    pending_attach: Mutex<HashMap<(String, u32), ExitWatch>>,
    fail_start: AtomicBool,
    fail_attach: AtomicBool,
}

impl FakeHandler {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            calls: Mutex::new(Vec::new()),
            exits: Mutex::new(HashMap::new()),
            pending_attach: Mutex::new(HashMap::new()),
            fail_start: AtomicBool::new(false),
            fail_attach: AtomicBool::new(false),
        }
    }

    /// Snapshot of every call made so far, in order.
    pub fn calls(&self) -> Vec<HandlerCall> {
        self.calls.lock().clone()
    }

    pub fn start_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| matches!(c, HandlerCall::Start(..))).count()
    }

    pub fn stops(&self) -> Vec<(String, u32)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HandlerCall::Stop(service, instance) => Some((service.clone(), *instance)),
                _ => None,
            })
            .collect()
    }

    /// Whether a started container for the key has not yet exited.
    pub fn running(&self, service_id: &str, instance_id: u32) -> bool {
        self.exits.lock().contains_key(&(service_id.to_string(), instance_id))
    }

    /// Report the container as exited at the clock's current time.
    /// Returns false if no live container matches.
    pub fn trigger_exit(&self, service_id: &str, instance_id: u32) -> bool {
        let sender = self.exits.lock().remove(&(service_id.to_string(), instance_id));
        match sender {
            Some(tx) => tx.send(self.clock.now_utc()).is_ok(),
            None => false,
        }
    }

    /// Stage a pre-existing container so the next attach for the key
    /// succeeds (as after a supervisor restart without a cache entry).
    pub fn stage_attachable(&self, service_id: &str, instance_id: u32) {
        let key = (service_id.to_string(), instance_id);
        let (tx, rx) = oneshot::channel();
        self.exits.lock().insert(key.clone(), tx);
        self.pending_attach.lock().insert(key, rx);
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: HandlerCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ContainerHandler for FakeHandler {
    async fn start_container(
        &self,
        _cancel: &CancellationToken,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(InstanceState, ExitWatch), HandlerError> {
        self.record(HandlerCall::Start(service_id.to_string(), instance_id));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(HandlerError::Runtime("start refused".to_string()));
        }
        let (tx, rx) = oneshot::channel();
        self.exits.lock().insert((service_id.to_string(), instance_id), tx);
        let state = InstanceState {
            container_id: format!("fake-{}-{}", service_id, instance_id),
            image_id: "fake-image".to_string(),
            paused: false,
            started: Some(self.clock.now_utc()),
            terminated: None,
        };
        Ok((state, rx))
    }

    async fn attach_container(
        &self,
        _state: &InstanceState,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<Option<ExitWatch>, HandlerError> {
        self.record(HandlerCall::Attach(service_id.to_string(), instance_id));
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(HandlerError::Runtime("attach refused".to_string()));
        }
        Ok(self.pending_attach.lock().remove(&(service_id.to_string(), instance_id)))
    }

    async fn pause_container(
        &self,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(), HandlerError> {
        self.record(HandlerCall::Pause(service_id.to_string(), instance_id));
        Ok(())
    }

    async fn resume_container(
        &self,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(), HandlerError> {
        self.record(HandlerCall::Resume(service_id.to_string(), instance_id));
        Ok(())
    }

    async fn stop_container(
        &self,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(), HandlerError> {
        self.record(HandlerCall::Stop(service_id.to_string(), instance_id));
        // a real stop makes the runtime report the exit
        if let Some(tx) = self.exits.lock().remove(&(service_id.to_string(), instance_id)) {
            let _ = tx.send(self.clock.now_utc());
        }
        Ok(())
    }
}
