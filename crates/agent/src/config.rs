// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: TOML file with environment overrides.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default configuration path when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/corral/corrald.toml";

/// Agent configuration.
///
/// Every field except `host_id` has a default; `host_id` must come from
/// the file or from `CORRAL_HOST_ID`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host_id: String,
    /// Coordination backend. Only `standalone` (in-process) is built in;
    /// clustered deployments embed the engine with their own client.
    #[serde(default = "default_coordinator")]
    pub coordinator: String,
    /// tracing env-filter directive, overridable with `CORRAL_LOG`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub docker: DockerConfig,
}

/// Docker Engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_socket")]
    pub socket: PathBuf,
    /// Grace period passed to the engine when stopping a container.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
    #[serde(default = "default_image")]
    pub default_image: String,
    /// Per-service image overrides, keyed by service id.
    #[serde(default)]
    pub images: HashMap<String, String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: default_docker_socket(),
            stop_timeout_secs: default_stop_timeout(),
            default_image: default_image(),
            images: HashMap::new(),
        }
    }
}

impl DockerConfig {
    /// Image to run for a service: the override table, else the default.
    pub fn image_for(&self, service_id: &str) -> &str {
        self.images.get(service_id).map(String::as_str).unwrap_or(&self.default_image)
    }
}

fn default_coordinator() -> String {
    "standalone".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_docker_socket() -> PathBuf {
    PathBuf::from("/var/run/docker.sock")
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_image() -> String {
    "busybox:latest".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("could not parse {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("host_id is not set (config file or CORRAL_HOST_ID)")]
    MissingHostId,

    #[error("unknown coordinator backend {0:?}")]
    UnknownCoordinator(String),
}

impl Config {
    /// Load configuration from `path`, then apply environment overrides
    /// (`CORRAL_HOST_ID`, `CORRAL_DOCKER_SOCKET`, `CORRAL_LOG`).
    ///
    /// A missing file at the default path is fine (everything can come
    /// from the environment); an explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.clone(), e))?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                Config::default()
            }
            Err(err) => return Err(ConfigError::Read(path, err)),
        };
        if config.coordinator.is_empty() {
            config.coordinator = default_coordinator();
        }
        if config.log_filter.is_empty() {
            config.log_filter = default_log_filter();
        }

        if let Ok(host_id) = std::env::var("CORRAL_HOST_ID") {
            config.host_id = host_id;
        }
        if let Ok(socket) = std::env::var("CORRAL_DOCKER_SOCKET") {
            config.docker.socket = PathBuf::from(socket);
        }
        if let Ok(filter) = std::env::var("CORRAL_LOG") {
            config.log_filter = filter;
        }

        if config.host_id.is_empty() {
            return Err(ConfigError::MissingHostId);
        }
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
