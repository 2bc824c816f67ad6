// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Deterministic entity identity derivation.
//!
//! Identities are derived from immutable business keys, never hand-assigned.
//! The formulas are frozen: stored identifiers depend on them and idempotent
//! re-registration only works while identical business keys keep producing
//! identical ids.
//!
//! URIs and URLs are lowered before hashing because OPC UA matches them
//! case-insensitively; display layers keep the original casing.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

// =============================================================================
// Constants
// =============================================================================

/// Id prefix for server-side applications.
const APPLICATION_SERVER_PREFIX: &str = "uas";

/// Id prefix for client-side applications.
const APPLICATION_CLIENT_PREFIX: &str = "uac";

/// Id prefix for endpoints.
const ENDPOINT_PREFIX: &str = "uat";

/// Marker separating device and module parts of a module entity id.
const MODULE_MARKER: &str = "_module_";

// =============================================================================
// Parameter Enums
// =============================================================================

/// The declared role of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationType {
    /// Server only.
    Server,
    /// Client only.
    Client,
    /// Both client and server.
    ClientAndServer,
    /// Discovery server.
    DiscoveryServer,
}

impl ApplicationType {
    /// Returns the canonical name used inside identity hashes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationType::Server => "Server",
            ApplicationType::Client => "Client",
            ApplicationType::ClientAndServer => "ClientAndServer",
            ApplicationType::DiscoveryServer => "DiscoveryServer",
        }
    }

    /// Returns `true` for roles that accept connections.
    pub fn is_server(&self) -> bool {
        !matches!(self, ApplicationType::Client)
    }
}

impl Default for ApplicationType {
    fn default() -> Self {
        ApplicationType::Server
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The security mode of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityMode {
    /// Highest mode the endpoint offers.
    Best,
    /// Signing only.
    Sign,
    /// Signing and encryption.
    SignAndEncrypt,
    /// No security.
    None,
}

impl SecurityMode {
    /// Returns the canonical name used inside identity hashes.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::Best => "Best",
            SecurityMode::Sign => "Sign",
            SecurityMode::SignAndEncrypt => "SignAndEncrypt",
            SecurityMode::None => "None",
        }
    }
}

impl Default for SecurityMode {
    fn default() -> Self {
        SecurityMode::Best
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Derivation Functions
// =============================================================================

/// Derives an application id from its business keys.
///
/// The type defaults to [`ApplicationType::Server`] when absent. Client and
/// discovery-server applications get the client prefix, everything else the
/// server prefix.
pub fn application_id(
    site_or_gateway_id: Option<&str>,
    application_uri: &str,
    application_type: Option<ApplicationType>,
) -> String {
    let app_type = application_type.unwrap_or_default();
    let prefix = match app_type {
        ApplicationType::Client | ApplicationType::DiscoveryServer => APPLICATION_CLIENT_PREFIX,
        _ => APPLICATION_SERVER_PREFIX,
    };
    let site = site_or_gateway_id.unwrap_or("");
    let uri = application_uri.to_lowercase();
    format!("{}{}", prefix, sha1_hex(&format!("{}-{}-{}", site, app_type, uri)))
}

/// Derives an endpoint id from its business keys.
///
/// The security mode defaults to [`SecurityMode::Best`] when absent; an
/// absent policy hashes as the empty string.
pub fn endpoint_id(
    application_id: &str,
    endpoint_url: &str,
    security_mode: Option<SecurityMode>,
    security_policy: Option<&str>,
) -> String {
    let mode = security_mode.unwrap_or_default();
    let url = endpoint_url.to_lowercase();
    let policy = security_policy.unwrap_or("").to_lowercase();
    format!(
        "{}{}",
        ENDPOINT_PREFIX,
        sha1_hex(&format!("{}-{}-{}-{}", application_id, url, mode, policy))
    )
}

/// Derives the entity id of an edge module.
///
/// A missing or empty module id yields the bare device id.
pub fn module_entity_id(device_id: &str, module_id: Option<&str>) -> String {
    match module_id {
        Some(module) if !module.is_empty() => {
            format!("{}{}{}", device_id, MODULE_MARKER, module)
        }
        _ => device_id.to_string(),
    }
}

/// Splits a module entity id back into its device and module parts.
///
/// Anything without the module marker is a bare device id.
pub fn parse_module_entity_id(id: &str) -> (&str, Option<&str>) {
    match id.split_once(MODULE_MARKER) {
        Some((device, module)) => (device, Some(module)),
        None => (id, None),
    }
}

/// Derives a gateway id: the device id itself.
pub fn gateway_id(device_id: &str) -> String {
    device_id.to_string()
}

fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

// =============================================================================
// Tests
// =============================================================================
