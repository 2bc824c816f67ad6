// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registration record snapshots.
//!
//! One record type per tracked entity kind. Every record derives its
//! identity from immutable business keys via [`crate::identity`], so
//! re-registering the same entity collapses onto the same record.
//!
//! Equality is value-wise over the semantically meaningful fields:
//! URIs and URLs compare case-insensitively, set-valued fields compare
//! content-wise, an absent `disabled` equals explicit `false`. Liveness
//! and concurrency metadata (`connected`, `not_seen_since`, `revision`,
//! the drift flag) never participate. Registry consistency sweeps rely
//! on this equality as the "in sync" test.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tether_core::error::{RegistryError, RegistryResult};

use crate::identity::{
    application_id, endpoint_id, gateway_id, module_entity_id, parse_module_entity_id,
    ApplicationType, SecurityMode,
};

// =============================================================================
// Entity Kind
// =============================================================================

/// The kind of a tracked entity.
///
/// The lowercase name doubles as the `__type__` infrastructure value the
/// lifecycle controller reports, which registry-side twin queries match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// An OPC UA application (server or client).
    Application,
    /// One endpoint of an application.
    Endpoint,
    /// A supervisor module activating endpoint twins.
    Supervisor,
    /// A discoverer module scanning for servers.
    Discoverer,
    /// A publisher module publishing node values.
    Publisher,
    /// An edge gateway device.
    Gateway,
}

impl EntityKind {
    /// Returns the lowercase name used as the `__type__` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Application => "application",
            EntityKind::Endpoint => "endpoint",
            EntityKind::Supervisor => "supervisor",
            EntityKind::Discoverer => "discoverer",
            EntityKind::Publisher => "publisher",
            EntityKind::Gateway => "gateway",
        }
    }

    /// Returns `true` for the kinds that run as edge modules.
    pub fn is_module(&self) -> bool {
        matches!(
            self,
            EntityKind::Supervisor | EntityKind::Discoverer | EntityKind::Publisher
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Normalization Helpers
// =============================================================================

fn lowered_set(values: &BTreeSet<String>) -> BTreeSet<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn normalized_policy(policy: Option<&str>) -> String {
    policy.unwrap_or("").to_lowercase()
}

fn normalized_module(module_id: Option<&str>) -> Option<String> {
    module_id.filter(|m| !m.is_empty()).map(str::to_string)
}

/// Checks for an RFC 3986 scheme followed by a non-empty remainder.
fn is_absolute_uri(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// =============================================================================
// Application Record
// =============================================================================

/// Registration record of an OPC UA application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// The application URI (business key, original casing).
    pub application_uri: String,

    /// Human-readable application name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,

    /// Declared application role.
    #[serde(default)]
    pub application_type: ApplicationType,

    /// Product URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_uri: Option<String>,

    /// Declared server capabilities (e.g. "LDS", "DA").
    #[serde(default)]
    pub capabilities: BTreeSet<String>,

    /// Discovery URLs the application can be reached on.
    #[serde(default)]
    pub discovery_urls: BTreeSet<String>,

    /// Identity of the discoverer module that found this application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discoverer_id: Option<String>,

    /// Site the application belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    /// Whether the record is administratively disabled. Absent means false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    /// Whether the entity is currently reachable.
    #[serde(default)]
    pub connected: bool,

    /// When the entity went missing from discovery, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_seen_since: Option<DateTime<Utc>>,

    /// Opaque concurrency token of the stored record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl ApplicationRecord {
    /// Creates a record for the given application URI with server defaults.
    pub fn new(application_uri: impl Into<String>) -> Self {
        Self {
            application_uri: application_uri.into(),
            application_name: None,
            application_type: ApplicationType::default(),
            product_uri: None,
            capabilities: BTreeSet::new(),
            discovery_urls: BTreeSet::new(),
            discoverer_id: None,
            site_id: None,
            disabled: None,
            connected: false,
            not_seen_since: None,
            revision: None,
        }
    }

    /// Returns the entity kind.
    pub fn kind(&self) -> EntityKind {
        EntityKind::Application
    }

    /// Returns the site id, falling back to the discoverer's device part.
    pub fn site_or_gateway_id(&self) -> Option<&str> {
        match self.site_id.as_deref() {
            Some(site) => Some(site),
            None => self
                .discoverer_id
                .as_deref()
                .map(|id| parse_module_entity_id(id).0),
        }
    }

    /// Derives the record identity from its business keys.
    pub fn identity(&self) -> String {
        application_id(
            self.site_or_gateway_id(),
            &self.application_uri,
            Some(self.application_type),
        )
    }

    /// Validates the registration contract.
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` when the application URI is missing or not
    /// absolute, when a server-type application declares no discovery URL or
    /// no capability, or when a pure client declares either.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.application_uri.is_empty() {
            return Err(RegistryError::missing_field("application_uri"));
        }
        if !is_absolute_uri(&self.application_uri) {
            return Err(RegistryError::invalid_uri(
                "application_uri",
                &self.application_uri,
            ));
        }
        if self.application_type.is_server() {
            if self.discovery_urls.is_empty() {
                return Err(RegistryError::validation(
                    "discovery_urls",
                    "server applications must declare at least one discovery URL",
                ));
            }
            if self.capabilities.is_empty() {
                return Err(RegistryError::validation(
                    "capabilities",
                    "server applications must declare at least one capability",
                ));
            }
        } else {
            if !self.discovery_urls.is_empty() {
                return Err(RegistryError::validation(
                    "discovery_urls",
                    "client applications must not declare discovery URLs",
                ));
            }
            if !self.capabilities.is_empty() {
                return Err(RegistryError::validation(
                    "capabilities",
                    "client applications must not declare capabilities",
                ));
            }
        }
        Ok(())
    }

    /// Returns `true` if the record is disabled. Absent means false.
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }

    /// Stamps the record as missing from discovery.
    pub fn mark_missing(&mut self) {
        self.not_seen_since = Some(Utc::now());
        self.connected = false;
    }

    /// Clears the missing stamp on re-registration.
    pub fn mark_seen(&mut self) {
        self.not_seen_since = None;
    }
}

impl PartialEq for ApplicationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.application_uri.to_lowercase() == other.application_uri.to_lowercase()
            && self.application_name == other.application_name
            && self.application_type == other.application_type
            && self.product_uri.as_deref().map(str::to_lowercase)
                == other.product_uri.as_deref().map(str::to_lowercase)
            && self.capabilities == other.capabilities
            && lowered_set(&self.discovery_urls) == lowered_set(&other.discovery_urls)
            && self.discoverer_id == other.discoverer_id
            && self.site_id == other.site_id
            && self.is_disabled() == other.is_disabled()
    }
}

impl Eq for ApplicationRecord {}

impl Hash for ApplicationRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.application_uri.to_lowercase().hash(state);
        self.application_name.hash(state);
        self.application_type.hash(state);
        self.product_uri
            .as_deref()
            .map(str::to_lowercase)
            .hash(state);
        self.capabilities.hash(state);
        lowered_set(&self.discovery_urls).hash(state);
        self.discoverer_id.hash(state);
        self.site_id.hash(state);
        self.is_disabled().hash(state);
    }
}

// =============================================================================
// Endpoint Record
// =============================================================================

/// Registration record of one application endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Identity of the owning application (business key).
    pub application_id: String,

    /// The endpoint URL (business key, original casing).
    pub endpoint_url: String,

    /// Alternative URLs the endpoint is reachable on.
    #[serde(default)]
    pub alternative_urls: BTreeSet<String>,

    /// Security mode of the endpoint (business key, defaults to Best).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_mode: Option<SecurityMode>,

    /// Security policy URI of the endpoint (business key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_policy: Option<String>,

    /// Thumbprint of the server certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_thumbprint: Option<String>,

    /// Site the endpoint belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    /// Whether the record is administratively disabled. Absent means false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    /// Whether the endpoint twin is currently reachable.
    #[serde(default)]
    pub connected: bool,

    /// When the entity went missing from discovery, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_seen_since: Option<DateTime<Utc>>,

    /// Opaque concurrency token of the stored record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    #[serde(skip)]
    in_sync: bool,
}

impl EndpointRecord {
    /// Creates a record for the given application and endpoint URL.
    pub fn new(application_id: impl Into<String>, endpoint_url: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            endpoint_url: endpoint_url.into(),
            alternative_urls: BTreeSet::new(),
            security_mode: None,
            security_policy: None,
            certificate_thumbprint: None,
            site_id: None,
            disabled: None,
            connected: false,
            not_seen_since: None,
            revision: None,
            in_sync: false,
        }
    }

    /// Returns the entity kind.
    pub fn kind(&self) -> EntityKind {
        EntityKind::Endpoint
    }

    /// Derives the record identity from its business keys.
    pub fn identity(&self) -> String {
        endpoint_id(
            &self.application_id,
            &self.endpoint_url,
            self.security_mode,
            self.security_policy.as_deref(),
        )
    }

    /// Validates the registration contract.
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` when the owning application id is missing
    /// or the endpoint URL is missing or not absolute.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.application_id.is_empty() {
            return Err(RegistryError::missing_field("application_id"));
        }
        if self.endpoint_url.is_empty() {
            return Err(RegistryError::missing_field("endpoint_url"));
        }
        if !is_absolute_uri(&self.endpoint_url) {
            return Err(RegistryError::invalid_uri("endpoint_url", &self.endpoint_url));
        }
        Ok(())
    }

    /// Returns `true` if the record is disabled. Absent means false.
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }

    /// Records whether the exchanged field subset matched `other` at the
    /// last consistency sweep.
    pub fn mark_in_sync_with(&mut self, other: &EndpointRecord) {
        self.in_sync = self.endpoint_url.to_lowercase() == other.endpoint_url.to_lowercase()
            && lowered_set(&self.alternative_urls) == lowered_set(&other.alternative_urls)
            && self.security_mode.unwrap_or_default() == other.security_mode.unwrap_or_default()
            && normalized_policy(self.security_policy.as_deref())
                == normalized_policy(other.security_policy.as_deref())
            && self.certificate_thumbprint == other.certificate_thumbprint;
    }

    /// Returns the drift flag set by the last consistency sweep.
    pub fn is_in_sync(&self) -> bool {
        self.in_sync
    }

    /// Stamps the record as missing from discovery.
    pub fn mark_missing(&mut self) {
        self.not_seen_since = Some(Utc::now());
        self.connected = false;
    }

    /// Clears the missing stamp on re-registration.
    pub fn mark_seen(&mut self) {
        self.not_seen_since = None;
    }
}

impl PartialEq for EndpointRecord {
    fn eq(&self, other: &Self) -> bool {
        self.application_id == other.application_id
            && self.endpoint_url.to_lowercase() == other.endpoint_url.to_lowercase()
            && lowered_set(&self.alternative_urls) == lowered_set(&other.alternative_urls)
            && self.security_mode.unwrap_or_default() == other.security_mode.unwrap_or_default()
            && normalized_policy(self.security_policy.as_deref())
                == normalized_policy(other.security_policy.as_deref())
            && self.certificate_thumbprint == other.certificate_thumbprint
            && self.site_id == other.site_id
            && self.is_disabled() == other.is_disabled()
    }
}

impl Eq for EndpointRecord {}

impl Hash for EndpointRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.application_id.hash(state);
        self.endpoint_url.to_lowercase().hash(state);
        lowered_set(&self.alternative_urls).hash(state);
        self.security_mode.unwrap_or_default().hash(state);
        normalized_policy(self.security_policy.as_deref()).hash(state);
        self.certificate_thumbprint.hash(state);
        self.site_id.hash(state);
        self.is_disabled().hash(state);
    }
}

// =============================================================================
// Module Record
// =============================================================================

/// Registration record of an edge module (supervisor, discoverer, publisher).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Module kind. Must be one of the module kinds.
    pub kind: EntityKind,

    /// Device the module runs on (business key).
    pub device_id: String,

    /// Module id within the device (business key). Absent for standalone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,

    /// Site the module belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    /// Reported agent software version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Reported log level of the agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Whether the record is administratively disabled. Absent means false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    /// Whether the module is currently connected.
    #[serde(default)]
    pub connected: bool,

    /// When the module went missing, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_seen_since: Option<DateTime<Utc>>,

    /// Opaque concurrency token of the stored record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    #[serde(skip)]
    in_sync: bool,
}

impl ModuleRecord {
    /// Creates a record for the given kind, device, and module id.
    pub fn new(
        kind: EntityKind,
        device_id: impl Into<String>,
        module_id: Option<String>,
    ) -> Self {
        Self {
            kind,
            device_id: device_id.into(),
            module_id,
            site_id: None,
            version: None,
            log_level: None,
            disabled: None,
            connected: false,
            not_seen_since: None,
            revision: None,
            in_sync: false,
        }
    }

    /// Derives the record identity from its business keys.
    pub fn identity(&self) -> String {
        module_entity_id(&self.device_id, self.module_id.as_deref())
    }

    /// Validates the registration contract.
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` when the device id is missing or the kind
    /// is not a module kind.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.device_id.is_empty() {
            return Err(RegistryError::missing_field("device_id"));
        }
        if !self.kind.is_module() {
            return Err(RegistryError::validation(
                "kind",
                format!("{} is not a module kind", self.kind),
            ));
        }
        Ok(())
    }

    /// Returns `true` if the record is disabled. Absent means false.
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }

    /// Records whether the exchanged field subset matched `other` at the
    /// last consistency sweep.
    pub fn mark_in_sync_with(&mut self, other: &ModuleRecord) {
        self.in_sync = self.site_id == other.site_id && self.log_level == other.log_level;
    }

    /// Returns the drift flag set by the last consistency sweep.
    pub fn is_in_sync(&self) -> bool {
        self.in_sync
    }

    /// Stamps the record as missing and disconnected.
    pub fn mark_missing(&mut self) {
        self.not_seen_since = Some(Utc::now());
        self.connected = false;
    }

    /// Clears the missing stamp on re-registration.
    pub fn mark_seen(&mut self) {
        self.not_seen_since = None;
    }
}

impl PartialEq for ModuleRecord {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.device_id == other.device_id
            && normalized_module(self.module_id.as_deref())
                == normalized_module(other.module_id.as_deref())
            && self.site_id == other.site_id
            && self.log_level == other.log_level
            && self.is_disabled() == other.is_disabled()
    }
}

impl Eq for ModuleRecord {}

impl Hash for ModuleRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.device_id.hash(state);
        normalized_module(self.module_id.as_deref()).hash(state);
        self.site_id.hash(state);
        self.log_level.hash(state);
        self.is_disabled().hash(state);
    }
}

// =============================================================================
// Gateway Record
// =============================================================================

/// Registration record of an edge gateway device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRecord {
    /// The gateway device id (business key).
    pub device_id: String,

    /// Site the gateway belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    /// Whether the record is administratively disabled. Absent means false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    /// Whether the gateway is currently connected.
    #[serde(default)]
    pub connected: bool,

    /// When the gateway went missing, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_seen_since: Option<DateTime<Utc>>,

    /// Opaque concurrency token of the stored record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl GatewayRecord {
    /// Creates a record for the given gateway device.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            site_id: None,
            disabled: None,
            connected: false,
            not_seen_since: None,
            revision: None,
        }
    }

    /// Returns the entity kind.
    pub fn kind(&self) -> EntityKind {
        EntityKind::Gateway
    }

    /// Derives the record identity from its business keys.
    pub fn identity(&self) -> String {
        gateway_id(&self.device_id)
    }

    /// Validates the registration contract.
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` when the device id is missing.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.device_id.is_empty() {
            return Err(RegistryError::missing_field("device_id"));
        }
        Ok(())
    }

    /// Returns `true` if the record is disabled. Absent means false.
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }

    /// Stamps the record as missing and disconnected.
    pub fn mark_missing(&mut self) {
        self.not_seen_since = Some(Utc::now());
        self.connected = false;
    }

    /// Clears the missing stamp on re-registration.
    pub fn mark_seen(&mut self) {
        self.not_seen_since = None;
    }
}

impl PartialEq for GatewayRecord {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
            && self.site_id == other.site_id
            && self.is_disabled() == other.is_disabled()
    }
}

impl Eq for GatewayRecord {}

impl Hash for GatewayRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.device_id.hash(state);
        self.site_id.hash(state);
        self.is_disabled().hash(state);
    }
}

// =============================================================================
// Tests
// =============================================================================
