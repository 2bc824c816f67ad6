// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Twin lifecycle controller.
//!
//! The host owns one twin session end to end: it connects a transport,
//! registers the dispatch tables, reconciles the fetched twin against the
//! settings handlers, keeps the reported cache in sync with every patch it
//! sends, and tears the session down on stop.
//!
//! One exclusivity lock guards start, stop, sends, and desired-update
//! handling, so a twin mutation never races teardown. Desired updates
//! arriving while the lock is held queue on it and run afterwards.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use tether_core::error::{HostError, HostResult, TransportError};
use tether_core::transport::{
    DesiredUpdateHandler, MethodCallHandler, TelemetryMessage, TransportFactory, TwinSnapshot,
    TwinTransport, CONTENT_TYPE_KEY, DEVICE_ID_KEY, MODULE_ID_KEY,
};
use tether_core::types::{
    is_infrastructure_key, TwinIdentity, CONNECTED_PROPERTY, SITE_ID_PROPERTY, TYPE_PROPERTY,
};
use tether_core::value::{TwinPropertySet, TwinValue};

use crate::config::HostConfig;
use crate::methods::MethodRouter;
use crate::settings::SettingsRouter;

// =============================================================================
// Host State
// =============================================================================

/// Lifecycle state of a twin host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostState {
    /// Not started, or stopped again.
    #[default]
    Stopped,
    /// Start in progress.
    Starting,
    /// Connected with the twin reconciled.
    Running,
    /// Stop in progress.
    Stopping,
}

impl HostState {
    /// Returns the lowercase state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Stopped => "stopped",
            HostState::Starting => "starting",
            HostState::Running => "running",
            HostState::Stopping => "stopping",
        }
    }

    /// Returns `true` while the session is usable.
    pub fn is_running(&self) -> bool {
        matches!(self, HostState::Running)
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Host Internals
// =============================================================================

/// Mutable session state behind the exclusivity lock.
struct HostInner {
    state: HostState,
    transport: Option<Box<dyn TwinTransport>>,
    identity: Option<TwinIdentity>,
    /// Mirror of the reported document, folded on every sent patch.
    reported: TwinPropertySet,
    site_id: Option<String>,
}

/// Applies one infrastructure value to internal state. Infrastructure keys
/// never reach the settings dispatch table.
fn apply_infrastructure(inner: &mut HostInner, key: &str, value: &TwinValue) {
    match key {
        SITE_ID_PROPERTY => match value {
            TwinValue::String(site) => inner.site_id = Some(site.clone()),
            TwinValue::Null => inner.site_id = None,
            other => {
                warn!(value_type = other.type_name(), "Ignoring non-string site id")
            }
        },
        // Type and connectivity originate on this side; an incoming echo
        // carries no new state.
        _ => debug!(key = %key, "Ignoring infrastructure echo"),
    }
}

/// Diffs an authoritative settings echo against the cached reported values,
/// keeping only additions, changes, and removals.
fn diff_against_cache(
    cache: &TwinPropertySet,
    processed: &TwinPropertySet,
    patch: &mut TwinPropertySet,
) {
    for (key, value) in processed.iter() {
        match cache.get(key) {
            None => {
                if !value.is_null() {
                    patch.insert(key.clone(), value.clone());
                }
            }
            Some(prior) => {
                if prior != value {
                    patch.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

async fn send_patch(inner: &mut HostInner, patch: &TwinPropertySet) -> Result<(), TransportError> {
    match inner.transport.as_mut() {
        Some(transport) => transport.update_reported(patch).await,
        None => Err(TransportError::NotConnected),
    }
}

// =============================================================================
// TwinHost
// =============================================================================

/// The twin lifecycle controller.
///
/// Create one per agent identity, start it once the dispatch tables are
/// built, and stop it on shutdown. A stopped host can be started again; the
/// factory produces a fresh transport per session.
pub struct TwinHost {
    factory: Box<dyn TransportFactory>,
    settings: Arc<SettingsRouter>,
    methods: Arc<MethodRouter>,
    config: HostConfig,
    inner: Arc<Mutex<HostInner>>,
}

impl TwinHost {
    /// Creates a host over the given transport factory and dispatch tables.
    ///
    /// # Errors
    ///
    /// Returns `HostError::InvalidConfig` when the configuration is
    /// invalid.
    pub fn new(
        factory: Box<dyn TransportFactory>,
        settings: Arc<SettingsRouter>,
        methods: Arc<MethodRouter>,
        config: HostConfig,
    ) -> HostResult<Self> {
        config.validate()?;
        let inner = HostInner {
            state: HostState::Stopped,
            transport: None,
            identity: None,
            reported: TwinPropertySet::new(),
            site_id: config.site_id.clone(),
        };
        Ok(Self {
            factory,
            settings,
            methods,
            config,
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Starts the twin session.
    ///
    /// Connects a fresh transport, registers the method and desired-update
    /// handlers before the first twin fetch, reconciles the fetched twin
    /// through the settings dispatch table, and reports the infrastructure
    /// keys. On any failure the half-open session is closed and cleared
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `HostError::AlreadyStarted` when a session is active, or the
    /// underlying transport error when the session cannot be established.
    #[instrument(skip(self), fields(entity_type = %self.config.entity_type))]
    pub async fn start(&self) -> HostResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.transport.is_some() {
            return Err(HostError::AlreadyStarted);
        }
        inner.state = HostState::Starting;

        let mut transport = match self.factory.create().await {
            Ok(transport) => transport,
            Err(e) => {
                inner.state = HostState::Stopped;
                return Err(HostError::Transport(e));
            }
        };

        // Handlers go in before the first fetch so no method call or
        // desired change arriving in between is lost.
        let setup = async {
            let identity = transport.connect().await?;
            transport.set_operation_timeout(self.config.operation_timeout);
            let methods: Arc<dyn MethodCallHandler> = self.methods.clone();
            transport.set_method_handler(methods).await?;
            let bridge = Arc::new(DesiredBridge {
                inner: Arc::clone(&self.inner),
                settings: Arc::clone(&self.settings),
            });
            transport.set_desired_handler(bridge).await?;
            let snapshot = transport.fetch_twin().await?;
            Ok::<(TwinIdentity, TwinSnapshot), TransportError>((identity, snapshot))
        };

        let (identity, snapshot) = match setup.await {
            Ok(session) => session,
            Err(e) => {
                if let Err(close_error) = transport.close().await {
                    warn!(error = %close_error, "Closing failed session transport failed");
                }
                inner.state = HostState::Stopped;
                return Err(HostError::Transport(e));
            }
        };

        inner.identity = Some(identity.clone());
        inner.transport = Some(transport);

        if let Err(e) = self.reconcile(&mut inner, snapshot).await {
            self.teardown(&mut inner).await;
            return Err(HostError::Transport(e));
        }

        if let Err(e) = self.report_infrastructure(&mut inner).await {
            self.teardown(&mut inner).await;
            return Err(HostError::Transport(e));
        }

        inner.state = HostState::Running;
        info!(identity = %identity, "Twin host started");
        Ok(())
    }

    /// Stops the twin session.
    ///
    /// Best-effort reports `__connected__ = false`, closes the transport
    /// under the shortened stop timeout, and clears the session state.
    /// Failures during teardown are logged, never propagated; stopping an
    /// already stopped host does nothing.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        let Some(mut transport) = inner.transport.take() else {
            return;
        };
        inner.state = HostState::Stopping;

        // Teardown runs under the shortened timeout so a dead channel
        // cannot hang the caller.
        transport.set_operation_timeout(self.config.stop_timeout);

        let mut offline = TwinPropertySet::new();
        offline.insert(CONNECTED_PROPERTY, false);
        if let Err(e) = transport.update_reported(&offline).await {
            warn!(error = %e, "Reporting disconnect failed");
        }

        if let Err(e) = transport.close().await {
            error!(error = %e, "Transport close failed");
        }

        inner.identity = None;
        inner.reported.clear();
        inner.site_id = self.config.site_id.clone();
        inner.state = HostState::Stopped;
        info!("Twin host stopped");
    }

    /// Reports a single property and folds it into the reported cache.
    ///
    /// Map values merge key-wise into the cached value with the incoming
    /// side winning; null removes the key.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotStarted` while stopped, or the transport
    /// error when the patch cannot be sent.
    pub async fn send_reported(
        &self,
        key: impl Into<String>,
        value: impl Into<TwinValue>,
    ) -> HostResult<()> {
        let key = key.into();
        let value = value.into();
        let mut inner = self.inner.lock().await;
        if inner.transport.is_none() {
            return Err(HostError::NotStarted);
        }

        let mut patch = TwinPropertySet::new();
        patch.insert(key.clone(), value.clone());
        send_patch(&mut inner, &patch).await?;
        inner.reported.apply(&key, &value);
        Ok(())
    }

    /// Sends one telemetry message wrapped in the standard envelope.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotStarted` while stopped, or the transport
    /// error when the message cannot be sent.
    pub async fn send_telemetry(
        &self,
        payload: Vec<u8>,
        content_type: Option<&str>,
    ) -> HostResult<()> {
        let mut inner = self.inner.lock().await;
        let message = envelope(&inner, payload, content_type)?;
        match inner.transport.as_mut() {
            Some(transport) => Ok(transport.send_telemetry(message).await?),
            None => Err(HostError::NotStarted),
        }
    }

    /// Sends a batch of telemetry messages, each wrapped in the standard
    /// envelope.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotStarted` while stopped, or the transport
    /// error when the batch cannot be sent.
    pub async fn send_telemetry_batch(
        &self,
        payloads: Vec<Vec<u8>>,
        content_type: Option<&str>,
    ) -> HostResult<()> {
        let mut inner = self.inner.lock().await;
        let mut messages = Vec::with_capacity(payloads.len());
        for payload in payloads {
            messages.push(envelope(&inner, payload, content_type)?);
        }
        match inner.transport.as_mut() {
            Some(transport) => Ok(transport.send_telemetry_batch(messages).await?),
            None => Err(HostError::NotStarted),
        }
    }

    /// Uploads a named blob through the transport.
    ///
    /// # Errors
    ///
    /// Returns `HostError::NotStarted` while stopped, or the transport
    /// error when the upload fails.
    pub async fn upload_blob(&self, name: &str, content: Vec<u8>) -> HostResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.transport.as_mut() {
            Some(transport) => Ok(transport.upload_blob(name, content).await?),
            None => Err(HostError::NotStarted),
        }
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> HostState {
        self.inner.lock().await.state
    }

    /// Returns the twin identity of the active session.
    pub async fn identity(&self) -> Option<TwinIdentity> {
        self.inner.lock().await.identity.clone()
    }

    /// Returns the current site id.
    pub async fn site_id(&self) -> Option<String> {
        self.inner.lock().await.site_id.clone()
    }

    /// Initial reconciliation of the fetched twin.
    ///
    /// Reported entries act as the desired-equivalent baseline (the agent
    /// re-asserts its last known configuration) unless a real desired entry
    /// for the same key exists; status wrappers are nulled out; the merged
    /// baseline runs through the settings dispatch table and only the
    /// resulting delta is sent.
    async fn reconcile(
        &self,
        inner: &mut HostInner,
        snapshot: TwinSnapshot,
    ) -> Result<(), TransportError> {
        if snapshot.is_empty() {
            return Ok(());
        }

        let mut baseline = TwinPropertySet::new();
        let mut patch = TwinPropertySet::new();

        for (key, value) in snapshot.reported.iter() {
            if value.is_status_wrapper() {
                // Status echoes are not configuration.
                patch.insert(key.clone(), TwinValue::Null);
                continue;
            }
            if is_infrastructure_key(key) {
                apply_infrastructure(inner, key, value);
                inner.reported.insert(key.clone(), value.clone());
                continue;
            }
            inner.reported.insert(key.clone(), value.clone());
            baseline.insert(key.clone(), value.clone());
        }

        for (key, value) in snapshot.desired.iter() {
            if is_infrastructure_key(key) {
                apply_infrastructure(inner, key, value);
                continue;
            }
            baseline.insert(key.clone(), value.clone());
        }

        let processed = self.settings.process(&baseline).await;
        diff_against_cache(&inner.reported, &processed, &mut patch);

        if !patch.is_empty() {
            send_patch(inner, &patch).await?;
            inner.reported.merge(&patch);
        }
        Ok(())
    }

    /// Unconditionally reports the infrastructure keys for this session.
    async fn report_infrastructure(&self, inner: &mut HostInner) -> Result<(), TransportError> {
        let mut infra = TwinPropertySet::new();
        infra.insert(TYPE_PROPERTY, self.config.entity_type.as_str());
        if let Some(site) = inner.site_id.clone() {
            infra.insert(SITE_ID_PROPERTY, site);
        }
        infra.insert(CONNECTED_PROPERTY, true);

        send_patch(inner, &infra).await?;
        inner.reported.merge(&infra);
        Ok(())
    }

    /// Closes and clears a half-open session after a start failure.
    async fn teardown(&self, inner: &mut HostInner) {
        if let Some(mut transport) = inner.transport.take() {
            if let Err(e) = transport.close().await {
                warn!(error = %e, "Transport close failed");
            }
        }
        inner.identity = None;
        inner.reported.clear();
        inner.site_id = self.config.site_id.clone();
        inner.state = HostState::Stopped;
    }
}

/// Wraps a payload in the standard telemetry envelope.
fn envelope(
    inner: &HostInner,
    payload: Vec<u8>,
    content_type: Option<&str>,
) -> HostResult<TelemetryMessage> {
    let Some(identity) = inner.identity.as_ref() else {
        return Err(HostError::NotStarted);
    };
    let mut message =
        TelemetryMessage::new(payload).with_property(DEVICE_ID_KEY, identity.device_id.as_str());
    if let Some(module) = identity.module_id.as_ref() {
        message = message.with_property(MODULE_ID_KEY, module.as_str());
    }
    if let Some(content_type) = content_type.filter(|c| !c.is_empty()) {
        message = message.with_property(CONTENT_TYPE_KEY, content_type);
    }
    Ok(message)
}

// =============================================================================
// Desired Update Bridge
// =============================================================================

/// Transport-facing handler repeating the reconciliation steps on every
/// desired-change notification.
struct DesiredBridge {
    inner: Arc<Mutex<HostInner>>,
    settings: Arc<SettingsRouter>,
}

#[async_trait]
impl DesiredUpdateHandler for DesiredBridge {
    async fn on_desired_update(&self, patch: TwinPropertySet) {
        if patch.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().await;
        if inner.transport.is_none() {
            warn!("Desired update after stop, dropping");
            return;
        }

        // Overlay the changed subset onto cached values so handlers see
        // full objects, not fragments.
        let mut effective = TwinPropertySet::new();
        for (key, value) in patch.iter() {
            if is_infrastructure_key(key) {
                apply_infrastructure(&mut inner, key, value);
                continue;
            }
            let merged = match inner.reported.get(key) {
                Some(existing) => existing.apply(value),
                None => value.clone(),
            };
            effective.insert(key.clone(), merged);
        }

        if effective.is_empty() {
            return;
        }

        let processed = self.settings.process(&effective).await;

        let mut outgoing = TwinPropertySet::new();
        diff_against_cache(&inner.reported, &processed, &mut outgoing);
        if outgoing.is_empty() {
            debug!("Desired update produced no reported changes");
            return;
        }

        match send_patch(&mut inner, &outgoing).await {
            Ok(()) => inner.reported.merge(&outgoing),
            // Never propagate into the transport callback; the state is
            // re-asserted on the next notification or restart.
            Err(e) => warn!(error = %e, "Reporting settings update failed"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tether_core::error::TransportResult;

    #[derive(Default)]
    struct StubCalls {
        connects: AtomicUsize,
        closes: AtomicUsize,
        patches: std::sync::Mutex<Vec<TwinPropertySet>>,
    }

    struct StubTransport {
        calls: Arc<StubCalls>,
        snapshot: TwinSnapshot,
    }

    #[async_trait]
    impl TwinTransport for StubTransport {
        async fn connect(&mut self) -> TransportResult<TwinIdentity> {
            self.calls.connects.fetch_add(1, Ordering::SeqCst);
            Ok(TwinIdentity::module("edge-1", "twin"))
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
            Ok(self.snapshot.clone())
        }

        async fn update_reported(&mut self, patch: &TwinPropertySet) -> TransportResult<()> {
            self.calls.patches.lock().unwrap().push(patch.clone());
            Ok(())
        }

        async fn send_telemetry(&mut self, _message: TelemetryMessage) -> TransportResult<()> {
            Ok(())
        }

        async fn upload_blob(&mut self, _name: &str, _content: Vec<u8>) -> TransportResult<()> {
            Ok(())
        }

        fn set_operation_timeout(&mut self, _timeout: Duration) {}

        async fn close(&mut self) -> TransportResult<()> {
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubFactory {
        calls: Arc<StubCalls>,
        snapshot: TwinSnapshot,
    }

    #[async_trait]
    impl TransportFactory for StubFactory {
        async fn create(&self) -> TransportResult<Box<dyn TwinTransport>> {
            Ok(Box::new(StubTransport {
                calls: Arc::clone(&self.calls),
                snapshot: self.snapshot.clone(),
            }))
        }
    }

    fn host_with(snapshot: TwinSnapshot) -> (TwinHost, Arc<StubCalls>) {
        let calls = Arc::new(StubCalls::default());
        let factory = Box::new(StubFactory {
            calls: Arc::clone(&calls),
            snapshot,
        });
        let settings = Arc::new(SettingsRouter::builder().build());
        let methods = Arc::new(MethodRouter::builder().build());
        let config = HostConfig::new("supervisor").with_site_id("site-1");
        let host = TwinHost::new(factory, settings, methods, config).unwrap();
        (host, calls)
    }

    #[tokio::test]
    async fn test_start_stop_state_machine() {
        let (host, calls) = host_with(TwinSnapshot::default());
        assert_eq!(host.state().await, HostState::Stopped);

        host.start().await.unwrap();
        assert_eq!(host.state().await, HostState::Running);
        assert!(host.state().await.is_running());
        assert_eq!(calls.connects.load(Ordering::SeqCst), 1);
        assert_eq!(
            host.identity().await,
            Some(TwinIdentity::module("edge-1", "twin"))
        );

        host.stop().await;
        assert_eq!(host.state().await, HostState::Stopped);
        assert_eq!(host.identity().await, None);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);

        // Restart creates a fresh transport.
        host.start().await.unwrap();
        assert_eq!(calls.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (host, _calls) = host_with(TwinSnapshot::default());
        host.start().await.unwrap();

        let result = host.start().await;
        assert!(matches!(result, Err(HostError::AlreadyStarted)));
        // The original session is unaffected.
        assert_eq!(host.state().await, HostState::Running);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (host, calls) = host_with(TwinSnapshot::default());
        host.stop().await;
        host.stop().await;
        assert_eq!(calls.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sends_rejected_while_stopped() {
        let (host, _calls) = host_with(TwinSnapshot::default());
        assert!(matches!(
            host.send_reported("k", "v").await,
            Err(HostError::NotStarted)
        ));
        assert!(matches!(
            host.send_telemetry(b"{}".to_vec(), None).await,
            Err(HostError::NotStarted)
        ));
        assert!(matches!(
            host.upload_blob("file", Vec::new()).await,
            Err(HostError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_empty_twin_reports_only_infrastructure() {
        let (host, calls) = host_with(TwinSnapshot::default());
        host.start().await.unwrap();

        let patches = calls.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        let infra = &patches[0];
        assert_eq!(
            infra.get(TYPE_PROPERTY),
            Some(&TwinValue::from("supervisor"))
        );
        assert_eq!(infra.get(SITE_ID_PROPERTY), Some(&TwinValue::from("site-1")));
        assert_eq!(infra.get(CONNECTED_PROPERTY), Some(&TwinValue::from(true)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let calls = Arc::new(StubCalls::default());
        let factory = Box::new(StubFactory {
            calls,
            snapshot: TwinSnapshot::default(),
        });
        let result = TwinHost::new(
            factory,
            Arc::new(SettingsRouter::builder().build()),
            Arc::new(MethodRouter::builder().build()),
            HostConfig::new("Supervisor"),
        );
        assert!(matches!(result, Err(HostError::InvalidConfig { .. })));
    }
}
