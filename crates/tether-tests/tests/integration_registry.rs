// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Registry Integration Tests
//!
//! Integration tests for tether-registry functionality including:
//!
//! - Deterministic entity identity derivation
//! - Registration record equality and hashing
//! - Record validation rules
//! - Liveness metadata and in-sync tracking
//!
//! ## Test Categories
//!
//! - `test_identity_*`: Identity derivation tests
//! - `test_records_*`: Registration record tests

use std::collections::HashSet;

use chrono::Utc;
use tether_core::RegistryError;
use tether_registry::{
    application_id, endpoint_id, gateway_id, module_entity_id, parse_module_entity_id,
    ApplicationRecord, ApplicationType, EndpointRecord, EntityKind, GatewayRecord, ModuleRecord,
    SecurityMode,
};

use tether_tests::common::RecordFixtures;

// =============================================================================
// Identity Tests
// =============================================================================

#[tokio::test]
async fn test_identity_application_is_deterministic_and_case_insensitive() {
    let record = RecordFixtures::server_application();
    let expected = application_id(
        Some("site-1"),
        "urn:plant-1:press-17",
        Some(ApplicationType::Server),
    );

    assert_eq!(record.identity(), expected);
    assert!(record.identity().starts_with("uas"));
    assert_eq!(record.identity().len(), 43);

    // Shouting the URI changes nothing.
    let mut shouted = RecordFixtures::server_application();
    shouted.application_uri = "URN:PLANT-1:PRESS-17".to_string();
    assert_eq!(shouted.identity(), expected);
}

#[tokio::test]
async fn test_identity_client_gets_its_own_prefix() {
    let record = RecordFixtures::client_application();
    assert!(record.identity().starts_with("uac"));

    // The same URI registered as a server lands on a different identity.
    let mut as_server = RecordFixtures::client_application();
    as_server.application_type = ApplicationType::Server;
    assert_ne!(record.identity(), as_server.identity());
}

#[tokio::test]
async fn test_identity_endpoint_chains_from_its_application() {
    let application = RecordFixtures::server_application();
    let endpoint = RecordFixtures::endpoint_for(&application.identity());

    let expected = endpoint_id(
        &application.identity(),
        "opc.tcp://10.0.0.17:4840",
        Some(SecurityMode::SignAndEncrypt),
        Some("http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256"),
    );
    assert_eq!(endpoint.identity(), expected);
    assert!(endpoint.identity().starts_with("uat"));

    // Moving the application moves every endpoint beneath it.
    let mut moved = RecordFixtures::server_application();
    moved.site_id = Some("site-2".to_string());
    let moved_endpoint = RecordFixtures::endpoint_for(&moved.identity());
    assert_ne!(endpoint.identity(), moved_endpoint.identity());
}

#[tokio::test]
async fn test_identity_module_id_round_trips() {
    let composite = module_entity_id("edge-gw-01", Some("supervisor"));
    assert_eq!(composite, "edge-gw-01_module_supervisor");
    assert_eq!(
        parse_module_entity_id(&composite),
        ("edge-gw-01", Some("supervisor"))
    );

    // A device-level entity keeps the bare device id.
    assert_eq!(module_entity_id("edge-gw-01", None), "edge-gw-01");
    assert_eq!(parse_module_entity_id("edge-gw-01"), ("edge-gw-01", None));

    assert_eq!(gateway_id("edge-gw-01"), "edge-gw-01");
    assert_eq!(
        RecordFixtures::supervisor_module().identity(),
        "edge-gw-01_module_supervisor"
    );
}

// =============================================================================
// Record Tests
// =============================================================================

#[tokio::test]
async fn test_records_equality_ignores_order_and_url_case() {
    let mut a = RecordFixtures::server_application();
    a.discovery_urls.clear();
    a.discovery_urls.insert("opc.tcp://b:4840".to_string());
    a.discovery_urls.insert("opc.tcp://a:4840".to_string());

    let mut b = RecordFixtures::server_application();
    b.discovery_urls.clear();
    b.discovery_urls.insert("OPC.TCP://A:4840".to_string());
    b.discovery_urls.insert("opc.tcp://B:4840".to_string());

    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    set.insert(b);
    assert_eq!(set.len(), 1);
}

#[tokio::test]
async fn test_records_equality_ignores_liveness_metadata() {
    let a = RecordFixtures::server_application();
    let mut b = a.clone();
    b.connected = true;
    b.not_seen_since = Some(Utc::now());
    b.revision = Some("42".to_string());

    assert_eq!(a, b);
}

#[tokio::test]
async fn test_records_absent_disabled_means_enabled() {
    let a = RecordFixtures::server_application();
    let mut b = a.clone();
    b.disabled = Some(false);
    assert_eq!(a, b);
    assert!(!b.is_disabled());

    b.disabled = Some(true);
    assert_ne!(a, b);
    assert!(b.is_disabled());
}

#[tokio::test]
async fn test_records_validation_contract() {
    assert!(RecordFixtures::server_application().validate().is_ok());
    assert!(RecordFixtures::client_application().validate().is_ok());
    assert!(RecordFixtures::supervisor_module().validate().is_ok());
    assert!(GatewayRecord::new("edge-gw-01").validate().is_ok());

    // A server must announce at least one discovery URL and capability.
    let mut silent_server = RecordFixtures::server_application();
    silent_server.discovery_urls.clear();
    assert!(silent_server.validate().is_err());

    // A pure client must announce neither.
    let mut chatty_client = RecordFixtures::client_application();
    chatty_client.capabilities.insert("DA".to_string());
    assert!(chatty_client.validate().is_err());

    // URIs must be absolute.
    let mut relative = RecordFixtures::server_application();
    relative.application_uri = "press-17".to_string();
    assert!(matches!(
        relative.validate(),
        Err(RegistryError::InvalidUri { .. })
    ));

    let empty = ApplicationRecord::new("");
    assert!(matches!(
        empty.validate(),
        Err(RegistryError::MissingField { .. })
    ));

    // Module records only cover module entity kinds.
    let impostor = ModuleRecord::new(EntityKind::Gateway, "edge-gw-01", None);
    assert!(impostor.validate().is_err());
}

#[tokio::test]
async fn test_records_in_sync_follows_the_cloud_view() {
    let application = RecordFixtures::server_application();
    let mut endpoint = RecordFixtures::endpoint_for(&application.identity());

    let mut cloud_view = endpoint.clone();
    cloud_view.endpoint_url = cloud_view.endpoint_url.to_uppercase();
    endpoint.mark_in_sync_with(&cloud_view);
    assert!(endpoint.is_in_sync());

    cloud_view.certificate_thumbprint = Some("AA:BB".to_string());
    endpoint.mark_in_sync_with(&cloud_view);
    assert!(!endpoint.is_in_sync());

    let mut module = RecordFixtures::supervisor_module();
    let mut module_view = module.clone();
    module.mark_in_sync_with(&module_view);
    assert!(module.is_in_sync());

    module_view.site_id = Some("site-2".to_string());
    module.mark_in_sync_with(&module_view);
    assert!(!module.is_in_sync());
}

#[tokio::test]
async fn test_records_missing_and_reseen_lifecycle() {
    let mut application = RecordFixtures::server_application();
    application.connected = true;

    application.mark_missing();
    assert!(application.not_seen_since.is_some());
    assert!(!application.connected);

    application.mark_seen();
    assert_eq!(application.not_seen_since, None);

    let mut gateway = GatewayRecord::new("edge-gw-01");
    gateway.mark_missing();
    assert!(gateway.not_seen_since.is_some());
    gateway.mark_seen();
    assert_eq!(gateway.not_seen_since, None);
}

#[tokio::test]
async fn test_records_serde_round_trip_preserves_equality() {
    let endpoint = RecordFixtures::endpoint_for("uas0123");
    let json = serde_json::to_string(&endpoint).expect("serializes");
    assert!(!json.contains("in_sync"));

    let back: EndpointRecord = serde_json::from_str(&json).expect("deserializes");
    assert_eq!(endpoint, back);
}
