// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Dispatch Integration Tests
//!
//! Integration tests for the tether-twin dispatch tables including:
//!
//! - Settings cascade across handler versions
//! - Catch-all bindings and unmatched keys
//! - Method routing, name normalization, and status codes
//! - Fault filtering and payload ceilings
//!
//! ## Test Categories
//!
//! - `test_settings_*`: Settings dispatch tests
//! - `test_methods_*`: Method dispatch tests

use std::sync::Arc;

use tether_core::{MethodError, SettingsError, TwinValue};
use tether_twin::{
    methods::{
        MAX_RESPONSE_SIZE, STATUS_BUSINESS_FAULT, STATUS_FAULT, STATUS_NOT_IMPLEMENTED, STATUS_OK,
        STATUS_TOO_LARGE,
    },
    MethodRouter, SettingsRouter,
};

use tether_tests::common::{
    init_test_logging, property_set, EchoMethodHandler, RecordingSettingsHandler,
    ScriptedMethodHandler,
};

// =============================================================================
// Settings Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_settings_cascade_prefers_lowest_accepting_version() {
    init_test_logging();
    let v1 = Arc::new(RecordingSettingsHandler::new("legacy", &["logLevel"]));
    let v2 = Arc::new(RecordingSettingsHandler::new("current", &["logLevel"]).with_version(2));
    v1.reject_sets(true);

    let router = SettingsRouter::builder()
        .register(v2.clone())
        .register(v1.clone())
        .build();

    let result = router
        .process(&property_set(&[("logLevel", TwinValue::from("Debug"))]))
        .await;

    // Version 1 was offered the key first, rejected it, and version 2 won.
    assert_eq!(v1.get_set_count(), 1);
    assert_eq!(v1.get_apply_count(), 0);
    assert_eq!(v2.stored("logLevel"), Some(TwinValue::from("Debug")));
    assert_eq!(v2.get_apply_count(), 1);
    assert_eq!(result.get("logLevel"), Some(&TwinValue::from("Debug")));

    // Reads cascade the same way.
    let read = router.get("logLevel").await.expect("readable");
    assert_eq!(read, TwinValue::from("Debug"));
}

#[tokio::test]
async fn test_settings_catch_all_collects_unclaimed_keys() {
    init_test_logging();
    let keyed = Arc::new(RecordingSettingsHandler::new("keyed", &["logLevel"]));
    let fallback = Arc::new(RecordingSettingsHandler::new("fallback", &[]).as_catch_all());

    let router = SettingsRouter::builder()
        .register(keyed.clone())
        .register(fallback.clone())
        .build();

    let result = router
        .process(&property_set(&[
            ("logLevel", TwinValue::from("Info")),
            ("customFlag", TwinValue::Bool(true)),
        ]))
        .await;

    assert_eq!(keyed.stored("logLevel"), Some(TwinValue::from("Info")));
    assert_eq!(fallback.stored("logLevel"), None);
    assert_eq!(fallback.stored("customFlag"), Some(TwinValue::Bool(true)));
    assert_eq!(result.len(), 2);
}

#[tokio::test]
async fn test_settings_unmatched_key_skips_without_failing_batch() {
    init_test_logging();
    let keyed = Arc::new(RecordingSettingsHandler::new("keyed", &["logLevel"]));
    let router = SettingsRouter::builder()
        .register(keyed.clone())
        .build();

    let result = router
        .process(&property_set(&[
            ("logLevel", TwinValue::from("Info")),
            ("orphan", TwinValue::from(1)),
        ]))
        .await;

    assert_eq!(result.len(), 1);
    assert_eq!(result.get("logLevel"), Some(&TwinValue::from("Info")));
    assert_eq!(result.get("orphan"), None);
}

#[tokio::test]
async fn test_settings_all_rejections_drop_the_key() {
    init_test_logging();
    let handler = Arc::new(RecordingSettingsHandler::new("strict", &["logLevel"]));
    handler.reject_sets(true);
    let router = SettingsRouter::builder()
        .register(handler.clone())
        .build();

    let result = router
        .process(&property_set(&[("logLevel", TwinValue::from("Verbose"))]))
        .await;

    assert!(result.is_empty());
    assert_eq!(handler.get_set_count(), 1);
    assert_eq!(handler.get_apply_count(), 0);
}

#[tokio::test]
async fn test_settings_apply_runs_once_per_touched_handler() {
    init_test_logging();
    let handler = Arc::new(RecordingSettingsHandler::new(
        "wide",
        &["logLevel", "publishInterval"],
    ));
    let router = SettingsRouter::builder()
        .register(handler.clone())
        .build();

    router
        .process(&property_set(&[
            ("logLevel", TwinValue::from("Info")),
            ("publishInterval", TwinValue::from(1000)),
        ]))
        .await;

    assert_eq!(handler.get_set_count(), 2);
    assert_eq!(handler.get_apply_count(), 1);
}

#[tokio::test]
async fn test_settings_unreadable_winner_echoes_desired_value() {
    init_test_logging();
    let handler = Arc::new(RecordingSettingsHandler::new("writeonly", &["secret"]));
    handler.fail_reads(true);
    let router = SettingsRouter::builder()
        .register(handler.clone())
        .build();

    let result = router
        .process(&property_set(&[("secret", TwinValue::from("s3cr3t"))]))
        .await;

    assert_eq!(result.get("secret"), Some(&TwinValue::from("s3cr3t")));
}

#[tokio::test]
async fn test_settings_get_without_binding_is_not_supported() {
    init_test_logging();
    let router = SettingsRouter::builder().build();
    let err = router.get("anything").await.unwrap_err();
    assert!(matches!(err, SettingsError::NotSupported { .. }));
}

// =============================================================================
// Method Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_methods_normalize_case_and_async_suffix() {
    init_test_logging();
    let router = MethodRouter::builder()
        .register(Arc::new(EchoMethodHandler::new("reboot")))
        .register(Arc::new(ScriptedMethodHandler::new("reset_v2", || {
            Ok(b"v2".to_vec())
        })))
        .build();

    for name in ["reboot", "REBOOT", "Reboot", "rebootAsync", "RebootAsync"] {
        let response = router.dispatch(name, b"ping").await;
        assert_eq!(response.status, STATUS_OK, "{name}");
        assert_eq!(response.payload, b"ping", "{name}");
    }

    // Version suffixes are part of the name, the async suffix is not.
    let response = router.dispatch("Reset_V2Async", b"").await;
    assert_eq!(response.status, STATUS_OK);
    assert_eq!(response.payload, b"v2");

    assert!(router.supports("REBOOTASYNC"));
    assert!(!router.supports("rebootasyncasync"));
}

#[tokio::test]
async fn test_methods_unknown_name_not_implemented() {
    init_test_logging();
    let router = MethodRouter::builder().build();
    let response = router.dispatch("factoryReset", b"{}").await;
    assert_eq!(response.status, STATUS_NOT_IMPLEMENTED);
    assert!(response.payload.is_empty());
}

#[tokio::test]
async fn test_methods_response_ceiling() {
    init_test_logging();
    let router = MethodRouter::builder()
        .register(Arc::new(ScriptedMethodHandler::new("snug", || {
            Ok(vec![0u8; MAX_RESPONSE_SIZE])
        })))
        .register(Arc::new(ScriptedMethodHandler::new("oversize", || {
            Ok(vec![0u8; MAX_RESPONSE_SIZE + 1])
        })))
        .build();

    let response = router.dispatch("snug", b"").await;
    assert_eq!(response.status, STATUS_OK);
    assert_eq!(response.payload.len(), MAX_RESPONSE_SIZE);

    let response = router.dispatch("oversize", b"").await;
    assert_eq!(response.status, STATUS_TOO_LARGE);
    assert!(response.payload.is_empty());
}

#[tokio::test]
async fn test_methods_business_fault_keeps_its_payload() {
    init_test_logging();
    let router = MethodRouter::builder()
        .register(Arc::new(ScriptedMethodHandler::new("calibrate", || {
            Err(MethodError::business_fault(
                br#"{"code":"axis-busy"}"#.to_vec(),
            ))
        })))
        .build();

    let response = router.dispatch("calibrate", b"").await;
    assert_eq!(response.status, STATUS_BUSINESS_FAULT);
    assert_eq!(response.payload, br#"{"code":"axis-busy"}"#);
}

#[tokio::test]
async fn test_methods_default_filter_shapes_fault_payload() {
    init_test_logging();
    let router = MethodRouter::builder()
        .register(Arc::new(ScriptedMethodHandler::new("calibrate", || {
            Err(MethodError::execution_failed("axis jammed"))
        })))
        .build();

    let response = router.dispatch("calibrate", b"").await;
    assert_eq!(response.status, STATUS_FAULT);

    let body: serde_json::Value = serde_json::from_slice(&response.payload).expect("json fault");
    assert!(body["Message"]
        .as_str()
        .expect("message string")
        .contains("axis jammed"));
    assert_eq!(body["Details"], "execution_failed");
}

#[tokio::test]
async fn test_methods_cascade_in_registration_order() {
    init_test_logging();
    let router = MethodRouter::builder()
        .register(Arc::new(ScriptedMethodHandler::new("probe", || {
            Err(MethodError::execution_failed("first refused"))
        })))
        .register(Arc::new(ScriptedMethodHandler::new("probe", || {
            Ok(b"second answered".to_vec())
        })))
        .build();

    let response = router.dispatch("probe", b"").await;
    assert_eq!(response.status, STATUS_OK);
    assert_eq!(response.payload, b"second answered");

    // When every candidate fails, the first error is the one surfaced.
    let router = MethodRouter::builder()
        .register(Arc::new(ScriptedMethodHandler::new("probe", || {
            Err(MethodError::execution_failed("first refused"))
        })))
        .register(Arc::new(ScriptedMethodHandler::new("probe", || {
            Err(MethodError::execution_failed("second refused"))
        })))
        .build();

    let response = router.dispatch("probe", b"").await;
    assert_eq!(response.status, STATUS_FAULT);
    let body: serde_json::Value = serde_json::from_slice(&response.payload).expect("json fault");
    assert!(body["Message"]
        .as_str()
        .expect("message string")
        .contains("first refused"));
}
