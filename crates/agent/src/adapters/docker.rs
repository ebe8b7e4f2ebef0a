// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container handler backed by the Docker Engine API.
//!
//! Containers are named `corral-<service>-<instance>` so every primitive
//! can address them without a registry lookup; the instance label set at
//! create time makes them attributable from `docker ps` as well.

use async_trait::async_trait;
use corral_core::{Clock, InstanceState, ServiceId};
use corral_engine::{ActionHandler, ContainerHandler, ExitWatch, HandlerError};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::http::{self, HttpResponse};
use crate::config::DockerConfig;

/// Pinned engine API version; old enough for any current daemon.
const API: &str = "/v1.41";

/// Attempts to re-establish a `/wait` call before giving the container up.
const WAIT_ATTEMPTS: usize = 3;

#[derive(Deserialize)]
struct IdResponse {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Deserialize)]
struct InspectResponse {
    #[serde(rename = "State")]
    state: InspectState,
}

#[derive(Deserialize)]
struct InspectState {
    #[serde(rename = "Running")]
    running: bool,
}

pub struct DockerHandler<C> {
    config: DockerConfig,
    clock: C,
}

impl<C: Clock> DockerHandler<C> {
    pub fn new(config: DockerConfig, clock: C) -> Self {
        Self { config, clock }
    }

    fn container_name(service_id: &ServiceId, instance_id: u32) -> String {
        format!("corral-{}-{}", service_id, instance_id)
    }

    /// Block on the engine's `/wait` endpoint in a background task and
    /// report the stop time on the returned channel. Dropping the sender
    /// (wait kept failing) tells the supervisor the container is gone.
    fn watch_exit(&self, container_id: &str) -> ExitWatch {
        let (tx, rx) = oneshot::channel();
        let socket = self.config.socket.clone();
        let clock = self.clock.clone();
        let container_id = container_id.to_string();
        tokio::spawn(async move {
            let path = format!("{}/containers/{}/wait", API, container_id);
            for attempt in 1..=WAIT_ATTEMPTS {
                match http::post_blocking(&socket, &path, "").await {
                    Ok(resp) if resp.status == 200 => {
                        let _ = tx.send(clock.now_utc());
                        return;
                    }
                    Ok(resp) if resp.status == 404 => {
                        // container already removed; report it stopped now
                        let _ = tx.send(clock.now_utc());
                        return;
                    }
                    Ok(resp) => {
                        warn!(
                            container_id = %container_id,
                            status = resp.status,
                            attempt,
                            "container wait rejected"
                        );
                    }
                    Err(err) => {
                        warn!(
                            container_id = %container_id,
                            error = %err,
                            attempt,
                            "container wait failed"
                        );
                    }
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        });
        rx
    }
}

fn api_error(context: &str, resp: &HttpResponse) -> HandlerError {
    HandlerError::Runtime(format!(
        "{}: status {}: {}",
        context,
        resp.status,
        resp.text().trim()
    ))
}

fn parse_json<'a, T: Deserialize<'a>>(context: &str, resp: &'a HttpResponse) -> Result<T, HandlerError> {
    serde_json::from_slice(&resp.body)
        .map_err(|e| HandlerError::Runtime(format!("{}: malformed response: {}", context, e)))
}

#[async_trait]
impl<C: Clock> ContainerHandler for DockerHandler<C> {
    async fn start_container(
        &self,
        _cancel: &CancellationToken,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(InstanceState, ExitWatch), HandlerError> {
        let name = Self::container_name(service_id, instance_id);
        let image = self.config.image_for(service_id.as_str()).to_string();
        let body = json!({
            "Image": image,
            "Labels": {
                "com.corral.service": service_id.as_str(),
                "com.corral.instance": instance_id.to_string(),
            },
        })
        .to_string();

        let create_path = format!("{}/containers/create?name={}", API, name);
        let mut resp = http::post(&self.config.socket, &create_path, &body).await?;
        if resp.status == 409 {
            // a stale container with our name survived an earlier run
            debug!(container = %name, "removing stale container before start");
            let remove = format!("{}/containers/{}?force=true", API, name);
            http::delete(&self.config.socket, &remove).await?;
            resp = http::post(&self.config.socket, &create_path, &body).await?;
        }
        if resp.status != 201 {
            return Err(api_error("create container", &resp));
        }
        let created: IdResponse = parse_json("create container", &resp)?;

        let start_path = format!("{}/containers/{}/start", API, created.id);
        let resp = http::post(&self.config.socket, &start_path, "").await?;
        if resp.status != 204 && resp.status != 304 {
            return Err(api_error("start container", &resp));
        }

        let state = InstanceState {
            container_id: created.id.clone(),
            image_id: image,
            paused: false,
            started: Some(self.clock.now_utc()),
            terminated: None,
        };
        let exited = self.watch_exit(&created.id);
        Ok((state, exited))
    }

    async fn attach_container(
        &self,
        state: &InstanceState,
        _service_id: &ServiceId,
        _instance_id: u32,
    ) -> Result<Option<ExitWatch>, HandlerError> {
        if state.container_id.is_empty() {
            return Ok(None);
        }
        let path = format!("{}/containers/{}/json", API, state.container_id);
        let resp = http::get(&self.config.socket, &path).await?;
        if resp.status == 404 {
            return Ok(None);
        }
        if resp.status != 200 {
            return Err(api_error("inspect container", &resp));
        }
        let inspect: InspectResponse = parse_json("inspect container", &resp)?;
        if !inspect.state.running {
            return Ok(None);
        }
        Ok(Some(self.watch_exit(&state.container_id)))
    }

    async fn pause_container(
        &self,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(), HandlerError> {
        let name = Self::container_name(service_id, instance_id);
        let path = format!("{}/containers/{}/pause", API, name);
        let resp = http::post(&self.config.socket, &path, "").await?;
        match resp.status {
            // 404/409: gone or not running, nothing to pause
            204 | 404 | 409 => Ok(()),
            _ => Err(api_error("pause container", &resp)),
        }
    }

    async fn resume_container(
        &self,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(), HandlerError> {
        let name = Self::container_name(service_id, instance_id);
        let path = format!("{}/containers/{}/unpause", API, name);
        let resp = http::post(&self.config.socket, &path, "").await?;
        match resp.status {
            204 | 404 | 409 => Ok(()),
            _ => Err(api_error("resume container", &resp)),
        }
    }

    async fn stop_container(
        &self,
        service_id: &ServiceId,
        instance_id: u32,
    ) -> Result<(), HandlerError> {
        let name = Self::container_name(service_id, instance_id);
        let path =
            format!("{}/containers/{}/stop?t={}", API, name, self.config.stop_timeout_secs);
        let resp = http::post(&self.config.socket, &path, "").await?;
        match resp.status {
            // 304: already stopped; 404: already gone
            204 | 304 | 404 => Ok(()),
            _ => Err(api_error("stop container", &resp)),
        }
    }
}

#[async_trait]
impl<C: Clock> ActionHandler for DockerHandler<C> {
    async fn run(&self, container_id: &str, command: &[String]) -> Result<Vec<u8>, HandlerError> {
        let body = json!({
            "AttachStdout": true,
            "AttachStderr": true,
            "Cmd": command,
        })
        .to_string();
        let exec_path = format!("{}/containers/{}/exec", API, container_id);
        let resp = http::post(&self.config.socket, &exec_path, &body).await?;
        if resp.status != 201 {
            return Err(api_error("create exec", &resp));
        }
        let exec: IdResponse = parse_json("create exec", &resp)?;

        let start_path = format!("{}/exec/{}/start", API, exec.id);
        let resp = http::post_blocking(
            &self.config.socket,
            &start_path,
            r#"{"Detach":false,"Tty":false}"#,
        )
        .await?;
        if resp.status != 200 {
            return Err(api_error("start exec", &resp));
        }
        Ok(demux_stream(&resp.body))
    }
}

/// Strip the engine's stream multiplexing: frames of an 8-byte header
/// (stream type, three zero bytes, big-endian payload length) followed by
/// the payload. Unframed output (tty mode) is returned as-is.
fn demux_stream(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut idx = 0;
    while raw.len().saturating_sub(idx) >= 8 {
        let header = &raw[idx..idx + 8];
        let framed = header[0] <= 2 && header[1] == 0 && header[2] == 0 && header[3] == 0;
        let length =
            u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = idx + 8;
        let end = start.saturating_add(length);
        if !framed || end > raw.len() {
            break;
        }
        out.extend_from_slice(&raw[start..end]);
        idx = end;
    }
    if idx == 0 && !raw.is_empty() {
        return raw.to_vec();
    }
    out
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
