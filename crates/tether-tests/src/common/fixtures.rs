// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built test data for consistent and reproducible testing.
//!
//! ## Design Principles
//!
//! - Fixtures are immutable and thread-safe
//! - Each fixture represents a realistic scenario
//! - Fixtures can be composed for complex test scenarios

use tether_core::{TwinPropertySet, TwinSnapshot, TwinValue, SITE_ID_PROPERTY};
use tether_registry::{ApplicationRecord, ApplicationType, EndpointRecord, EntityKind, ModuleRecord};

/// Build a property set from literal pairs.
pub fn property_set(pairs: &[(&str, TwinValue)]) -> TwinPropertySet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Build a map value from literal pairs.
pub fn map_value(pairs: &[(&str, TwinValue)]) -> TwinValue {
    TwinValue::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

// =============================================================================
// Snapshot Fixtures
// =============================================================================

/// Fixture providing standard twin snapshots.
pub struct SnapshotFixtures;

impl SnapshotFixtures {
    /// An empty twin, as served for a freshly provisioned entity.
    pub fn empty() -> TwinSnapshot {
        TwinSnapshot::default()
    }

    /// A twin whose desired log level drifted ahead of the reported one.
    ///
    /// Desired carries `logLevel = "Debug"` while reported still carries
    /// `logLevel = "Info"` plus a site assignment.
    pub fn log_level_drift() -> TwinSnapshot {
        TwinSnapshot::new(
            property_set(&[("logLevel", TwinValue::from("Debug"))]),
            property_set(&[
                ("logLevel", TwinValue::from("Info")),
                (SITE_ID_PROPERTY, TwinValue::from("site-1")),
            ]),
        )
    }

    /// A twin whose reported half carries a stale handler status echo.
    pub fn with_status_echo() -> TwinSnapshot {
        TwinSnapshot::new(
            TwinPropertySet::new(),
            property_set(&[
                (
                    "fwUpdate",
                    map_value(&[("Status", TwinValue::from("Downloading"))]),
                ),
                ("logLevel", TwinValue::from("Info")),
            ]),
        )
    }
}

// =============================================================================
// Record Fixtures
// =============================================================================

/// Fixture providing standard registration records.
pub struct RecordFixtures;

impl RecordFixtures {
    /// A valid OPC UA server application on site-1.
    pub fn server_application() -> ApplicationRecord {
        let mut record = ApplicationRecord::new("urn:plant-1:press-17");
        record.application_name = Some("Press 17".to_string());
        record.application_type = ApplicationType::Server;
        record.site_id = Some("site-1".to_string());
        record.capabilities.insert("DA".to_string());
        record
            .discovery_urls
            .insert("opc.tcp://10.0.0.17:4840".to_string());
        record
    }

    /// A valid pure client application with no server surface.
    pub fn client_application() -> ApplicationRecord {
        let mut record = ApplicationRecord::new("urn:plant-1:scada-client");
        record.application_type = ApplicationType::Client;
        record.site_id = Some("site-1".to_string());
        record
    }

    /// A valid endpoint beneath the given application.
    pub fn endpoint_for(application_id: &str) -> EndpointRecord {
        let mut record = EndpointRecord::new(application_id, "opc.tcp://10.0.0.17:4840");
        record.security_mode = Some(tether_registry::SecurityMode::SignAndEncrypt);
        record.security_policy =
            Some("http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256".to_string());
        record.site_id = Some("site-1".to_string());
        record
    }

    /// A supervisor module hosted on the edge gateway.
    pub fn supervisor_module() -> ModuleRecord {
        let mut record = ModuleRecord::new(
            EntityKind::Supervisor,
            "edge-gw-01",
            Some("supervisor".to_string()),
        );
        record.site_id = Some("site-1".to_string());
        record.version = Some("2.9.12".to_string());
        record
    }
}
