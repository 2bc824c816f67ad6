// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Identity types for TETHER.
//!
//! This module provides the identity types shared between the edge-side twin
//! controller and the cloud-side registry.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Controller-Infrastructure Property Keys
// =============================================================================

/// Reported property carrying the entity type tag of the agent.
///
/// The value is the lowercase entity kind name (e.g. `"supervisor"`), which
/// registry-side twin queries match against.
pub const TYPE_PROPERTY: &str = "__type__";

/// Reported property carrying the site the agent is assigned to.
pub const SITE_ID_PROPERTY: &str = "__siteid__";

/// Reported property carrying the agent connectivity flag.
pub const CONNECTED_PROPERTY: &str = "__connected__";

/// Returns `true` if `key` is interpreted by the twin controller itself and
/// never forwarded to settings handlers.
#[inline]
pub fn is_infrastructure_key(key: &str) -> bool {
    key == TYPE_PROPERTY || key == SITE_ID_PROPERTY || key == CONNECTED_PROPERTY
}

// =============================================================================
// Identifiers
// =============================================================================

/// A unique identifier for a device.
///
/// Device IDs are assigned by the transport layer and are stable across
/// restarts of the agent process.
///
/// # Examples
///
/// ```
/// use tether_core::types::DeviceId;
///
/// let id = DeviceId::new("gateway-001");
/// assert_eq!(id.as_str(), "gateway-001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new device ID.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID and returns the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A unique identifier for a module hosted on a device.
///
/// Standalone device agents have no module ID; agents running as one of
/// several modules on a gateway device carry one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Creates a new module ID.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID and returns the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Twin Identity
// =============================================================================

/// The identity of one twin: a device, optionally qualified by a module.
///
/// Returned by the transport on connect and held by the twin controller for
/// the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TwinIdentity {
    /// The device this twin belongs to.
    pub device_id: DeviceId,

    /// The module on the device, if the agent runs as a module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<ModuleId>,
}

impl TwinIdentity {
    /// Creates an identity for a standalone device agent.
    pub fn device(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into(),
            module_id: None,
        }
    }

    /// Creates an identity for a module agent on a device.
    pub fn module(device_id: impl Into<DeviceId>, module_id: impl Into<ModuleId>) -> Self {
        Self {
            device_id: device_id.into(),
            module_id: Some(module_id.into()),
        }
    }

    /// Returns `true` if the agent runs as a module.
    #[inline]
    pub fn is_module(&self) -> bool {
        self.module_id.is_some()
    }
}

impl fmt::Display for TwinIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module_id {
            Some(module_id) => write!(f, "{}/{}", self.device_id, module_id),
            None => write!(f, "{}", self.device_id),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id() {
        let id = DeviceId::new("test-device");
        assert_eq!(id.as_str(), "test-device");
        assert_eq!(format!("{}", id), "test-device");
    }

    #[test]
    fn test_module_id() {
        let id = ModuleId::new("twin");
        assert_eq!(id.as_str(), "twin");
        assert_eq!(format!("{}", id), "twin");
    }

    #[test]
    fn test_twin_identity_display() {
        let standalone = TwinIdentity::device("dev-1");
        assert_eq!(format!("{}", standalone), "dev-1");
        assert!(!standalone.is_module());

        let module = TwinIdentity::module("dev-1", "twin");
        assert_eq!(format!("{}", module), "dev-1/twin");
        assert!(module.is_module());
    }

    #[test]
    fn test_infrastructure_keys() {
        assert!(is_infrastructure_key(TYPE_PROPERTY));
        assert!(is_infrastructure_key(SITE_ID_PROPERTY));
        assert!(is_infrastructure_key(CONNECTED_PROPERTY));
        assert!(!is_infrastructure_key("logLevel"));
        assert!(!is_infrastructure_key("__other__"));
    }

    #[test]
    fn test_identity_serde_transparent() {
        let id = DeviceId::new("dev-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"dev-1\"");
    }
}
