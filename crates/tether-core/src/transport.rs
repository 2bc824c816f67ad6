// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Twin transport abstraction layer.
//!
//! This module defines the channel contract the twin controller runs over.
//! A transport exposes the per-device twin document, accepts reported
//! patches and telemetry, and delivers method calls and desired-property
//! updates through registered handlers.
//!
//! # Design Principles
//!
//! - **Channel Agnostic**: Controllers never see wire details
//! - **Async First**: All I/O operations are asynchronous
//! - **Thread Safe**: Handlers are `Send + Sync` for concurrent delivery
//!
//! # Lifecycle
//!
//! 1. Create a transport instance via [`TransportFactory`]
//! 2. Call `connect()` to obtain the twin identity
//! 3. Register method and desired-update handlers
//! 4. Use `fetch_twin()` / `update_reported()` for twin exchange
//! 5. Call `close()` when done

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;
use crate::types::TwinIdentity;
use crate::value::TwinPropertySet;

// =============================================================================
// Telemetry Envelope
// =============================================================================

/// Envelope property naming the originating device.
pub const DEVICE_ID_KEY: &str = "$$DeviceId";

/// Envelope property naming the originating module.
pub const MODULE_ID_KEY: &str = "$$ModuleId";

/// Envelope property naming the payload schema.
pub const MESSAGE_SCHEMA_KEY: &str = "$$MessageSchema";

/// Envelope property naming the payload content type.
pub const CONTENT_TYPE_KEY: &str = "$$ContentType";

/// Envelope property carrying the message creation time.
pub const CREATION_TIME_UTC_KEY: &str = "$$CreationTimeUtc";

/// A telemetry message: an opaque payload plus envelope properties.
///
/// Creation time is stamped at construction. The twin controller adds
/// the device, module, and content-type properties before handing the
/// message to the transport; callers may attach additional properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    payload: Vec<u8>,
    properties: BTreeMap<String, String>,
}

impl TelemetryMessage {
    /// Creates a message with the given payload, stamped with the
    /// current creation time.
    pub fn new(payload: Vec<u8>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            CREATION_TIME_UTC_KEY.to_string(),
            Utc::now().to_rfc3339(),
        );
        Self {
            payload,
            properties,
        }
    }

    /// Attaches an envelope property, replacing any existing value.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns an envelope property value.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns all envelope properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

// =============================================================================
// Twin Snapshot
// =============================================================================

/// A point-in-time copy of one twin document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwinSnapshot {
    /// The desired property set (cloud to edge).
    pub desired: TwinPropertySet,

    /// The reported property set (edge to cloud).
    pub reported: TwinPropertySet,
}

impl TwinSnapshot {
    /// Creates a snapshot from its two halves.
    pub fn new(desired: TwinPropertySet, reported: TwinPropertySet) -> Self {
        Self { desired, reported }
    }

    /// Returns `true` if both halves are empty.
    pub fn is_empty(&self) -> bool {
        self.desired.is_empty() && self.reported.is_empty()
    }
}

// =============================================================================
// Method Response
// =============================================================================

/// The wire response to a method call: a numeric status and a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
    /// Numeric response status.
    pub status: u16,

    /// Serialized response payload.
    pub payload: Vec<u8>,
}

impl MethodResponse {
    /// Creates a success response.
    pub fn ok(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            payload: payload.into(),
        }
    }

    /// Creates a response with an explicit status.
    pub fn with_status(status: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            payload: payload.into(),
        }
    }

    /// Returns `true` if the status signals success.
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// =============================================================================
// Callback Handlers
// =============================================================================

/// Receives method calls delivered by the transport.
///
/// Implementations must never panic and never propagate errors into the
/// transport layer; every fault is converted into a [`MethodResponse`].
#[async_trait]
pub trait MethodCallHandler: Send + Sync {
    /// Handles one method call and produces the wire response.
    async fn on_method_call(&self, name: &str, payload: &[u8]) -> MethodResponse;
}

/// Receives desired-property patches delivered by the transport.
///
/// Implementations must never panic; a fault inside the handler is logged
/// and swallowed, never surfaced to the transport.
#[async_trait]
pub trait DesiredUpdateHandler: Send + Sync {
    /// Handles one desired-property patch.
    async fn on_desired_update(&self, patch: TwinPropertySet);
}

// =============================================================================
// TwinTransport Trait
// =============================================================================

/// The channel one twin controller session runs over.
///
/// All methods take `&mut self`: the controller serializes every transport
/// operation behind its own exclusivity lock, so implementations never see
/// concurrent calls. Handler delivery happens on the transport's own tasks
/// and is independent of that lock.
#[async_trait]
pub trait TwinTransport: Send + Sync {
    /// Establishes the channel and returns the twin identity.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the channel cannot be
    /// established.
    async fn connect(&mut self) -> TransportResult<TwinIdentity>;

    /// Registers the handler receiving method calls.
    ///
    /// Must be called before [`fetch_twin`](Self::fetch_twin) so no call
    /// arriving between fetch and registration is lost.
    async fn set_method_handler(
        &mut self,
        handler: Arc<dyn MethodCallHandler>,
    ) -> TransportResult<()>;

    /// Registers the handler receiving desired-property patches.
    ///
    /// Must be called before [`fetch_twin`](Self::fetch_twin) so no update
    /// arriving between fetch and registration is lost.
    async fn set_desired_handler(
        &mut self,
        handler: Arc<dyn DesiredUpdateHandler>,
    ) -> TransportResult<()>;

    /// Fetches the current twin document.
    async fn fetch_twin(&mut self) -> TransportResult<TwinSnapshot>;

    /// Sends a reported-property patch. Null values remove keys.
    async fn update_reported(&mut self, patch: &TwinPropertySet) -> TransportResult<()>;

    /// Sends one telemetry message.
    async fn send_telemetry(&mut self, message: TelemetryMessage) -> TransportResult<()>;

    /// Sends a batch of telemetry messages.
    ///
    /// The default implementation sends each message sequentially.
    /// Transports with a native batch operation should override this.
    async fn send_telemetry_batch(
        &mut self,
        messages: Vec<TelemetryMessage>,
    ) -> TransportResult<()> {
        for message in messages {
            self.send_telemetry(message).await?;
        }
        Ok(())
    }

    /// Uploads a named blob.
    async fn upload_blob(&mut self, name: &str, content: Vec<u8>) -> TransportResult<()>;

    /// Bounds every subsequent channel operation by the given timeout.
    fn set_operation_timeout(&mut self, timeout: Duration);

    /// Closes the channel. The transport cannot be reused afterwards.
    async fn close(&mut self) -> TransportResult<()>;
}

// =============================================================================
// TransportFactory Trait
// =============================================================================

/// Creates one transport per controller session.
///
/// The controller builds a fresh transport on every start, so a stopped
/// controller can be started again.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Creates a new, unconnected transport.
    async fn create(&self) -> TransportResult<Box<dyn TwinTransport>>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_telemetry_message_properties() {
        let message = TelemetryMessage::new(b"payload".to_vec())
            .with_property(CONTENT_TYPE_KEY, "application/json")
            .with_property(DEVICE_ID_KEY, "dev-1");

        assert_eq!(message.payload(), b"payload");
        assert_eq!(message.property(CONTENT_TYPE_KEY), Some("application/json"));
        assert_eq!(message.property(DEVICE_ID_KEY), Some("dev-1"));
        assert_eq!(message.property(MODULE_ID_KEY), None);
        assert!(message.property(CREATION_TIME_UTC_KEY).is_some());
    }

    #[test]
    fn test_method_response() {
        let ok = MethodResponse::ok(b"{}".to_vec());
        assert_eq!(ok.status, 200);
        assert!(ok.is_success());

        let fault = MethodResponse::with_status(501, Vec::new());
        assert!(!fault.is_success());
    }

    #[test]
    fn test_snapshot_is_empty() {
        assert!(TwinSnapshot::default().is_empty());

        let mut desired = TwinPropertySet::new();
        desired.insert("a", 1);
        assert!(!TwinSnapshot::new(desired, TwinPropertySet::new()).is_empty());
    }

    struct CountingTransport {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl TwinTransport for CountingTransport {
        async fn connect(&mut self) -> TransportResult<TwinIdentity> {
            Ok(TwinIdentity::device("dev-1"))
        }

        async fn set_method_handler(
            &mut self,
            _handler: Arc<dyn MethodCallHandler>,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn set_desired_handler(
            &mut self,
            _handler: Arc<dyn DesiredUpdateHandler>,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn fetch_twin(&mut self) -> TransportResult<TwinSnapshot> {
            Ok(TwinSnapshot::default())
        }

        async fn update_reported(&mut self, _patch: &TwinPropertySet) -> TransportResult<()> {
            Ok(())
        }

        async fn send_telemetry(&mut self, _message: TelemetryMessage) -> TransportResult<()> {
            if self.sent.fetch_add(1, Ordering::SeqCst) >= 2 {
                return Err(TransportError::send_failed("full"));
            }
            Ok(())
        }

        async fn upload_blob(&mut self, _name: &str, _content: Vec<u8>) -> TransportResult<()> {
            Ok(())
        }

        fn set_operation_timeout(&mut self, _timeout: Duration) {}

        async fn close(&mut self) -> TransportResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_batch_sends_sequentially() {
        let mut transport = CountingTransport {
            sent: AtomicUsize::new(0),
        };

        let batch = vec![
            TelemetryMessage::new(b"a".to_vec()),
            TelemetryMessage::new(b"b".to_vec()),
        ];
        transport.send_telemetry_batch(batch).await.unwrap();
        assert_eq!(transport.sent.load(Ordering::SeqCst), 2);

        let overflow = vec![TelemetryMessage::new(b"c".to_vec())];
        assert!(transport.send_telemetry_batch(overflow).await.is_err());
    }
}
