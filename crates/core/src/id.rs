// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes for hosts, services, and scheduled instances.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Define a newtype ID wrapper around `SmolStr`.
///
/// Ids are assigned by the scheduler and arrive over the coordination
/// service; nothing here mints them. Generates `new()` for wrapping an
/// existing string, `as_str()`, `is_empty()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, `Borrow<str>`, and `Deref`
/// implementations.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct HostId;
/// }
/// ```
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub smol_str::SmolStr);

        impl $name {
            /// Wrap an existing id string.
            pub fn new(id: impl Into<smol_str::SmolStr>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the id is an empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Identifier of a host registered with the coordination service.
    pub struct HostId;
}

define_id! {
    /// Identifier of a service definition.
    pub struct ServiceId;
}

/// Composite key identifying one scheduled service instance on one host.
///
/// Encoded as `<host>:<service>:<instance>` so the same id names the node
/// on both the host-indexed and service-indexed coordination paths.
/// `Display` and `FromStr` are inverse operations; an id that does not
/// parse is garbage left on the coordination service and must be deleted,
/// never supervised.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateId {
    pub host_id: HostId,
    pub service_id: ServiceId,
    pub instance_id: u32,
}

impl StateId {
    pub fn new(host_id: impl Into<HostId>, service_id: impl Into<ServiceId>, instance_id: u32) -> Self {
        Self { host_id: host_id.into(), service_id: service_id.into(), instance_id }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host_id, self.service_id, self.instance_id)
    }
}

/// Failure to decode a state id back into its three components.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseStateIdError {
    #[error("state id {0:?} does not have three `:`-separated segments")]
    Segments(String),
    #[error("state id {0:?} has an empty host or service segment")]
    EmptySegment(String),
    #[error("state id {0:?} has a non-numeric instance segment")]
    Instance(String),
}

impl FromStr for StateId {
    type Err = ParseStateIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [host, service, instance] = parts[..] else {
            return Err(ParseStateIdError::Segments(s.to_string()));
        };
        if host.is_empty() || service.is_empty() {
            return Err(ParseStateIdError::EmptySegment(s.to_string()));
        }
        let instance_id =
            instance.parse::<u32>().map_err(|_| ParseStateIdError::Instance(s.to_string()))?;
        Ok(Self { host_id: HostId::new(host), service_id: ServiceId::new(service), instance_id })
    }
}

impl Serialize for StateId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StateId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = SmolStr::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
