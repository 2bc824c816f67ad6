// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Mock implementations for testing TETHER components in isolation.
//!
//! ## Design Principles
//!
//! - Configurable behavior for different test scenarios
//! - Recording of interactions for verification
//! - Thread-safe for concurrent testing
//! - Easy to set up error injection

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tether_core::{
    DesiredUpdateHandler, MethodCallHandler, MethodResponse, MethodResult, SettingsError,
    SettingsResult, TelemetryMessage, TransportError, TransportFactory, TransportResult,
    TwinIdentity, TwinPropertySet, TwinSnapshot, TwinTransport, TwinValue,
};
use tether_twin::{MethodHandler, SettingsHandler};

// =============================================================================
// Mock Twin Transport
// =============================================================================

/// Shared state behind a [`MockTransport`] and its factory.
///
/// The host consumes the boxed transport, so tests keep this handle to
/// inject faults, inspect recorded traffic, and drive the captured
/// handlers the way the cloud side would.
pub struct MockTwinState {
    /// Identity returned by connect.
    identity: Mutex<TwinIdentity>,

    /// Twin snapshot served by fetch_twin.
    snapshot: Mutex<TwinSnapshot>,

    /// Reported patches in send order.
    patches: Mutex<Vec<TwinPropertySet>>,

    /// Telemetry messages in send order.
    telemetry: Mutex<Vec<TelemetryMessage>>,

    /// Uploaded blobs in send order.
    uploads: Mutex<Vec<(String, Vec<u8>)>>,

    /// Operation timeouts in the order they were applied.
    timeouts: Mutex<Vec<Duration>>,

    /// Captured method-call handler.
    method_handler: Mutex<Option<Arc<dyn MethodCallHandler>>>,

    /// Captured desired-update handler.
    desired_handler: Mutex<Option<Arc<dyn DesiredUpdateHandler>>>,

    /// Transport operations in invocation order.
    call_order: Mutex<Vec<&'static str>>,

    /// Force factory creation to fail.
    fail_create: AtomicBool,

    /// Force connection to fail.
    fail_connect: AtomicBool,

    /// Force twin fetches to fail.
    fail_fetch: AtomicBool,

    /// Force reported patches to fail.
    fail_update: AtomicBool,

    /// Force close to fail.
    fail_close: AtomicBool,

    /// Create count for verification.
    create_count: AtomicU64,

    /// Connect count for verification.
    connect_count: AtomicU64,

    /// Close count for verification.
    close_count: AtomicU64,
}

impl MockTwinState {
    /// Create shared mock state with default settings.
    ///
    /// The default identity is the `twin` module on device `edge-1` and
    /// the default snapshot is empty.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            identity: Mutex::new(TwinIdentity::module("edge-1", "twin")),
            snapshot: Mutex::new(TwinSnapshot::default()),
            patches: Mutex::new(Vec::new()),
            telemetry: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
            method_handler: Mutex::new(None),
            desired_handler: Mutex::new(None),
            call_order: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            create_count: AtomicU64::new(0),
            connect_count: AtomicU64::new(0),
            close_count: AtomicU64::new(0),
        })
    }

    /// Set the identity returned by connect.
    pub fn set_identity(&self, identity: TwinIdentity) {
        *self.identity.lock().unwrap() = identity;
    }

    /// Set the snapshot served by fetch_twin.
    pub fn set_snapshot(&self, snapshot: TwinSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    /// Force factory creation to fail.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Force connection to fail.
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Force twin fetches to fail.
    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Force reported patches to fail.
    pub fn fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    /// Force close to fail.
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Get the create count.
    pub fn get_create_count(&self) -> u64 {
        self.create_count.load(Ordering::SeqCst)
    }

    /// Get the connect count.
    pub fn get_connect_count(&self) -> u64 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Get the close count.
    pub fn get_close_count(&self) -> u64 {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Get the reported patches sent so far.
    pub fn patches(&self) -> Vec<TwinPropertySet> {
        self.patches.lock().unwrap().clone()
    }

    /// Get the most recent reported patch.
    pub fn last_patch(&self) -> Option<TwinPropertySet> {
        self.patches.lock().unwrap().last().cloned()
    }

    /// Get the telemetry messages sent so far.
    pub fn telemetry(&self) -> Vec<TelemetryMessage> {
        self.telemetry.lock().unwrap().clone()
    }

    /// Get the blobs uploaded so far.
    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    /// Get the operation timeouts applied so far.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    /// Get the transport operations in invocation order.
    pub fn call_order(&self) -> Vec<&'static str> {
        self.call_order.lock().unwrap().clone()
    }

    /// Get the position of the first invocation of an operation.
    pub fn call_position(&self, operation: &str) -> Option<usize> {
        self.call_order
            .lock()
            .unwrap()
            .iter()
            .position(|op| *op == operation)
    }

    /// Whether a desired-update handler has been captured.
    pub fn has_desired_handler(&self) -> bool {
        self.desired_handler.lock().unwrap().is_some()
    }

    /// Whether a method-call handler has been captured.
    pub fn has_method_handler(&self) -> bool {
        self.method_handler.lock().unwrap().is_some()
    }

    /// Deliver a desired-property patch through the captured handler,
    /// exactly as the cloud side would.
    ///
    /// # Panics
    ///
    /// Panics when no handler has been registered yet.
    pub async fn push_desired(&self, patch: TwinPropertySet) {
        let handler = self
            .desired_handler
            .lock()
            .unwrap()
            .clone()
            .expect("no desired-update handler captured");
        handler.on_desired_update(patch).await;
    }

    /// Invoke a direct method through the captured handler, exactly as
    /// the cloud side would.
    ///
    /// # Panics
    ///
    /// Panics when no handler has been registered yet.
    pub async fn call_method(&self, name: &str, payload: &[u8]) -> MethodResponse {
        let handler = self
            .method_handler
            .lock()
            .unwrap()
            .clone()
            .expect("no method-call handler captured");
        handler.on_method_call(name, payload).await
    }

    fn record(&self, operation: &'static str) {
        self.call_order.lock().unwrap().push(operation);
    }
}

/// A mock twin transport writing every interaction into its shared state.
pub struct MockTransport {
    state: Arc<MockTwinState>,
}

impl MockTransport {
    /// Create a transport over the given shared state.
    pub fn new(state: Arc<MockTwinState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TwinTransport for MockTransport {
    async fn connect(&mut self) -> TransportResult<TwinIdentity> {
        self.state.record("connect");
        self.state.connect_count.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::connection_failed("mock connect failure"));
        }
        Ok(self.state.identity.lock().unwrap().clone())
    }

    async fn set_method_handler(
        &mut self,
        handler: Arc<dyn MethodCallHandler>,
    ) -> TransportResult<()> {
        self.state.record("set_method_handler");
        *self.state.method_handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn set_desired_handler(
        &mut self,
        handler: Arc<dyn DesiredUpdateHandler>,
    ) -> TransportResult<()> {
        self.state.record("set_desired_handler");
        *self.state.desired_handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn fetch_twin(&mut self) -> TransportResult<TwinSnapshot> {
        self.state.record("fetch_twin");

        if self.state.fail_fetch.load(Ordering::SeqCst) {
            return Err(TransportError::fetch_failed("mock fetch failure"));
        }
        Ok(self.state.snapshot.lock().unwrap().clone())
    }

    async fn update_reported(&mut self, patch: &TwinPropertySet) -> TransportResult<()> {
        self.state.record("update_reported");

        if self.state.fail_update.load(Ordering::SeqCst) {
            return Err(TransportError::send_failed("mock update failure"));
        }
        self.state.patches.lock().unwrap().push(patch.clone());
        Ok(())
    }

    async fn send_telemetry(&mut self, message: TelemetryMessage) -> TransportResult<()> {
        self.state.record("send_telemetry");
        self.state.telemetry.lock().unwrap().push(message);
        Ok(())
    }

    async fn upload_blob(&mut self, name: &str, content: Vec<u8>) -> TransportResult<()> {
        self.state.record("upload_blob");
        self.state
            .uploads
            .lock()
            .unwrap()
            .push((name.to_string(), content));
        Ok(())
    }

    fn set_operation_timeout(&mut self, timeout: Duration) {
        self.state.timeouts.lock().unwrap().push(timeout);
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.state.record("close");
        self.state.close_count.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

/// A factory handing out [`MockTransport`] instances over one shared state.
pub struct MockTransportFactory {
    state: Arc<MockTwinState>,
}

impl MockTransportFactory {
    /// Create a factory over the given shared state.
    pub fn new(state: Arc<MockTwinState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(&self) -> TransportResult<Box<dyn TwinTransport>> {
        self.state.create_count.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(TransportError::connection_failed("mock factory failure"));
        }
        Ok(Box::new(MockTransport::new(Arc::clone(&self.state))))
    }
}

// =============================================================================
// Mock Settings Handler
// =============================================================================

/// A configurable settings handler recording every assignment.
pub struct RecordingSettingsHandler {
    /// Handler name.
    name: String,

    /// Cascade version.
    version: u32,

    /// Claimed binding keys.
    keys: Vec<String>,

    /// Whether the handler also claims the catch-all binding.
    catch_all: bool,

    /// Force all sets to fail.
    reject_sets: AtomicBool,

    /// Force all gets to fail.
    fail_reads: AtomicBool,

    /// Accepted values keyed as delivered.
    values: Mutex<BTreeMap<String, TwinValue>>,

    /// Set count for verification.
    set_count: AtomicU64,

    /// Apply count for verification.
    apply_count: AtomicU64,
}

impl RecordingSettingsHandler {
    /// Create a handler claiming the given keys at version 1.
    pub fn new(name: impl Into<String>, keys: &[&str]) -> Self {
        Self {
            name: name.into(),
            version: 1,
            keys: keys.iter().map(|k| k.to_string()).collect(),
            catch_all: false,
            reject_sets: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            values: Mutex::new(BTreeMap::new()),
            set_count: AtomicU64::new(0),
            apply_count: AtomicU64::new(0),
        }
    }

    /// Set the cascade version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Claim the catch-all binding as well.
    pub fn as_catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }

    /// Force all sets to fail.
    pub fn reject_sets(&self, reject: bool) {
        self.reject_sets.store(reject, Ordering::SeqCst);
    }

    /// Force all gets to fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Get the value accepted for a key, if any.
    pub fn stored(&self, key: &str) -> Option<TwinValue> {
        self.values.lock().unwrap().get(key).cloned()
    }

    /// Get the set count.
    pub fn get_set_count(&self) -> u64 {
        self.set_count.load(Ordering::SeqCst)
    }

    /// Get the apply count.
    pub fn get_apply_count(&self) -> u64 {
        self.apply_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsHandler for RecordingSettingsHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn keys(&self) -> Vec<String> {
        self.keys.clone()
    }

    fn handles_any_key(&self) -> bool {
        self.catch_all
    }

    async fn set(&self, key: &str, value: &TwinValue) -> SettingsResult<()> {
        self.set_count.fetch_add(1, Ordering::SeqCst);

        if self.reject_sets.load(Ordering::SeqCst) {
            return Err(SettingsError::invalid_value(key, "mock rejection"));
        }
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> SettingsResult<TwinValue> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SettingsError::not_readable(key));
        }
        self.values
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SettingsError::not_readable(key))
    }

    async fn apply(&self) -> SettingsResult<()> {
        self.apply_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Mock Method Handlers
// =============================================================================

/// A method handler echoing the request payload back.
pub struct EchoMethodHandler {
    /// Method name.
    name: String,
}

impl EchoMethodHandler {
    /// Create an echo handler serving the given method name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl MethodHandler for EchoMethodHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, payload: &[u8]) -> MethodResult<Vec<u8>> {
        Ok(payload.to_vec())
    }
}

/// A method handler returning whatever its script produces.
pub struct ScriptedMethodHandler {
    /// Method name.
    name: String,

    /// Result script, run on every invocation.
    script: Box<dyn Fn() -> MethodResult<Vec<u8>> + Send + Sync>,
}

impl ScriptedMethodHandler {
    /// Create a scripted handler serving the given method name.
    pub fn new(
        name: impl Into<String>,
        script: impl Fn() -> MethodResult<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            script: Box::new(script),
        }
    }
}

#[async_trait]
impl MethodHandler for ScriptedMethodHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _payload: &[u8]) -> MethodResult<Vec<u8>> {
        (self.script)()
    }
}
