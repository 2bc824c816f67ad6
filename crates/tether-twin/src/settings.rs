// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Settings dispatch table.
//!
//! Maps desired property keys to versioned candidate handlers. Keys match
//! case-insensitively; a handler claims exact keys, the default/catch-all
//! binding, or both. Multiple candidates for the same key form a cascade
//! tried in ascending version order: the first handler that accepts the
//! value wins and becomes the authority for the reported echo.
//!
//! Per-key faults never fail a batch. A key every candidate rejects is
//! logged and dropped; it is retried implicitly on the next desired-change
//! notification.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use tether_core::error::{SettingsError, SettingsResult};
use tether_core::value::{TwinPropertySet, TwinValue};

/// Internal binding key of the default/catch-all handlers.
const DEFAULT_BINDING_KEY: &str = "@default";

// =============================================================================
// SettingsHandler Trait
// =============================================================================

/// A named, versioned settings handler.
///
/// A handler assigns incoming values with [`set`](Self::set), commits a
/// batch of assignments with [`apply`](Self::apply), and echoes the
/// authoritative value with [`get`](Self::get). Rejecting a value in `set`
/// hands the key to the next candidate in the cascade.
#[async_trait]
pub trait SettingsHandler: Send + Sync {
    /// Returns the handler name used in diagnostics.
    fn name(&self) -> &str;

    /// Returns the cascade version. Lower versions are tried first.
    fn version(&self) -> u32 {
        1
    }

    /// Returns the exact property keys this handler accepts.
    fn keys(&self) -> Vec<String>;

    /// Returns `true` if the handler also accepts keys no exact binding
    /// claims.
    fn handles_any_key(&self) -> bool {
        false
    }

    /// Assigns one property value.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` when the key or value is rejected.
    async fn set(&self, key: &str, value: &TwinValue) -> SettingsResult<()>;

    /// Reads back the authoritative value of one property.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotReadable` when the handler cannot echo
    /// the key.
    async fn get(&self, key: &str) -> SettingsResult<TwinValue>;

    /// Commits all values assigned since the last apply.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` when the commit fails; the failure is
    /// logged and the batch continues.
    async fn apply(&self) -> SettingsResult<()> {
        Ok(())
    }
}

// =============================================================================
// SettingsRouter
// =============================================================================

/// The settings dispatch table.
///
/// Built once at process start via [`SettingsRouter::builder`] and
/// immutable afterwards.
pub struct SettingsRouter {
    bindings: HashMap<String, Vec<Arc<dyn SettingsHandler>>>,
}

impl SettingsRouter {
    /// Starts building a router.
    pub fn builder() -> SettingsRouterBuilder {
        SettingsRouterBuilder {
            bindings: HashMap::new(),
        }
    }

    /// Returns `true` when an exact or catch-all binding covers the key.
    pub fn supports(&self, key: &str) -> bool {
        self.candidates(&key.to_lowercase()).is_some()
    }

    /// Returns the number of distinct binding keys.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    fn candidates(&self, key_lc: &str) -> Option<&[Arc<dyn SettingsHandler>]> {
        self.bindings
            .get(key_lc)
            .or_else(|| self.bindings.get(DEFAULT_BINDING_KEY))
            .map(Vec::as_slice)
    }

    /// Dispatches a batch of desired values and returns the authoritative
    /// reported echo, keyed by the original key casing.
    ///
    /// Each key cascades through its candidates in version order until one
    /// accepts it. Every handler that won at least one key gets a single
    /// `apply` call, then the echo is read back from each key's winner.
    /// Per-key and per-apply faults are logged and skipped; the batch
    /// never fails as a whole.
    #[instrument(skip(self, desired), fields(keys = desired.len()))]
    pub async fn process(&self, desired: &TwinPropertySet) -> TwinPropertySet {
        let mut winners: Vec<(String, TwinValue, Arc<dyn SettingsHandler>)> = Vec::new();
        let mut touched: Vec<Arc<dyn SettingsHandler>> = Vec::new();

        for (key, value) in desired.iter() {
            let key_lc = key.to_lowercase();
            let Some(candidates) = self.candidates(&key_lc) else {
                debug!(key = %key, "No binding for desired key, dropping");
                continue;
            };

            let mut winner: Option<&Arc<dyn SettingsHandler>> = None;
            let mut first_error: Option<SettingsError> = None;
            for handler in candidates {
                match handler.set(key, value).await {
                    Ok(()) => {
                        winner = Some(handler);
                        break;
                    }
                    Err(error) => {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                }
            }

            let Some(winner) = winner else {
                if let Some(error) = first_error {
                    warn!(key = %key, error = %error, "All candidates rejected desired value");
                }
                continue;
            };

            if !touched.iter().any(|h| Arc::ptr_eq(h, winner)) {
                touched.push(Arc::clone(winner));
            }
            winners.push((key.clone(), value.clone(), Arc::clone(winner)));
        }

        for handler in &touched {
            if let Err(error) = handler.apply().await {
                warn!(handler = handler.name(), error = %error, "Apply failed");
            }
        }

        // Echoes are read after apply so they reflect committed state. A
        // handler that cannot read a key back echoes the desired value.
        let mut reported = TwinPropertySet::new();
        for (key, desired_value, handler) in winners {
            let echoed = handler.get(&key).await.unwrap_or(desired_value);
            reported.insert(key, echoed);
        }
        reported
    }

    /// Reads the authoritative value of one key through the cascade.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotSupported` when no binding covers the
    /// key, or the earliest error when every candidate fails.
    pub async fn get(&self, key: &str) -> SettingsResult<TwinValue> {
        let key_lc = key.to_lowercase();
        let Some(candidates) = self.candidates(&key_lc) else {
            return Err(SettingsError::not_supported(key));
        };
        let mut first_error: Option<SettingsError> = None;
        for handler in candidates {
            match handler.get(key).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        Err(first_error.unwrap_or_else(|| SettingsError::not_supported(key)))
    }
}

// =============================================================================
// SettingsRouterBuilder
// =============================================================================

/// Builder collecting handler registrations.
pub struct SettingsRouterBuilder {
    bindings: HashMap<String, Vec<Arc<dyn SettingsHandler>>>,
}

impl SettingsRouterBuilder {
    /// Registers a handler under all keys it claims.
    pub fn register(mut self, handler: Arc<dyn SettingsHandler>) -> Self {
        for key in handler.keys() {
            self.bindings
                .entry(key.to_lowercase())
                .or_default()
                .push(Arc::clone(&handler));
        }
        if handler.handles_any_key() {
            self.bindings
                .entry(DEFAULT_BINDING_KEY.to_string())
                .or_default()
                .push(handler);
        }
        self
    }

    /// Finalizes the dispatch table, ordering each cascade by ascending
    /// version. The sort is stable, so same-version candidates keep their
    /// registration order.
    pub fn build(mut self) -> SettingsRouter {
        for candidates in self.bindings.values_mut() {
            candidates.sort_by_key(|handler| handler.version());
        }
        SettingsRouter {
            bindings: self.bindings,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct TestHandler {
        name: String,
        version: u32,
        keys: Vec<String>,
        catch_all: bool,
        reject_set: AtomicBool,
        readable: bool,
        values: Mutex<BTreeMap<String, TwinValue>>,
        apply_count: AtomicUsize,
    }

    impl TestHandler {
        fn new(name: &str, version: u32, keys: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                version,
                keys: keys.iter().map(|k| k.to_string()).collect(),
                catch_all: false,
                reject_set: AtomicBool::new(false),
                readable: true,
                values: Mutex::new(BTreeMap::new()),
                apply_count: AtomicUsize::new(0),
            }
        }

        fn catch_all(mut self) -> Self {
            self.catch_all = true;
            self
        }

        fn rejecting(self) -> Self {
            self.reject_set.store(true, Ordering::SeqCst);
            self
        }

        fn unreadable(mut self) -> Self {
            self.readable = false;
            self
        }

        fn stored(&self, key: &str) -> Option<TwinValue> {
            self.values.lock().unwrap().get(&key.to_lowercase()).cloned()
        }

        fn applies(&self) -> usize {
            self.apply_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SettingsHandler for TestHandler {
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
            if self.reject_set.load(Ordering::SeqCst) {
                return Err(SettingsError::invalid_value(key, "rejected"));
            }
            self.values
                .lock()
                .unwrap()
                .insert(key.to_lowercase(), value.clone());
            Ok(())
        }

        async fn get(&self, key: &str) -> SettingsResult<TwinValue> {
            if !self.readable {
                return Err(SettingsError::not_readable(key));
            }
            self.stored(key)
                .ok_or_else(|| SettingsError::not_readable(key))
        }

        async fn apply(&self) -> SettingsResult<()> {
            self.apply_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn desired(entries: &[(&str, &str)]) -> TwinPropertySet {
        let mut set = TwinPropertySet::new();
        for (key, value) in entries {
            set.insert(*key, *value);
        }
        set
    }

    #[tokio::test]
    async fn test_exact_key_matches_case_insensitively() {
        let handler = Arc::new(TestHandler::new("log", 1, &["LogLevel"]));
        let router = SettingsRouter::builder().register(handler.clone()).build();

        let reported = router.process(&desired(&[("loglevel", "Debug")])).await;

        assert_eq!(handler.stored("loglevel"), Some(TwinValue::from("Debug")));
        // The reported echo keeps the caller's key casing.
        assert_eq!(reported.get("loglevel"), Some(&TwinValue::from("Debug")));
        assert_eq!(handler.applies(), 1);
    }

    #[tokio::test]
    async fn test_cascade_tries_ascending_versions() {
        let v2 = Arc::new(TestHandler::new("v2", 2, &["interval"]));
        let v1 = Arc::new(TestHandler::new("v1", 1, &["interval"]).rejecting());
        // Registration order deliberately differs from version order.
        let router = SettingsRouter::builder()
            .register(v2.clone())
            .register(v1.clone())
            .build();

        let reported = router.process(&desired(&[("interval", "5s")])).await;

        assert_eq!(v1.stored("interval"), None);
        assert_eq!(v2.stored("interval"), Some(TwinValue::from("5s")));
        assert_eq!(reported.get("interval"), Some(&TwinValue::from("5s")));
        assert_eq!(router.get("interval").await.unwrap(), TwinValue::from("5s"));
        assert_eq!(v1.applies(), 0);
        assert_eq!(v2.applies(), 1);
    }

    #[tokio::test]
    async fn test_catch_all_receives_unclaimed_keys() {
        let exact = Arc::new(TestHandler::new("exact", 1, &["known"]));
        let fallback = Arc::new(TestHandler::new("fallback", 1, &[]).catch_all());
        let router = SettingsRouter::builder()
            .register(exact.clone())
            .register(fallback.clone())
            .build();

        router
            .process(&desired(&[("known", "a"), ("other", "b")]))
            .await;

        assert_eq!(exact.stored("known"), Some(TwinValue::from("a")));
        assert_eq!(exact.stored("other"), None);
        assert_eq!(fallback.stored("other"), Some(TwinValue::from("b")));
    }

    #[tokio::test]
    async fn test_unmatched_key_is_dropped_without_failing_batch() {
        let handler = Arc::new(TestHandler::new("log", 1, &["loglevel"]));
        let router = SettingsRouter::builder().register(handler.clone()).build();

        let reported = router
            .process(&desired(&[("unknown", "x"), ("loglevel", "Info")]))
            .await;

        assert_eq!(reported.len(), 1);
        assert_eq!(reported.get("loglevel"), Some(&TwinValue::from("Info")));
        assert!(router.get("unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_all_rejecting_drops_key_and_continues() {
        let v1 = Arc::new(TestHandler::new("v1", 1, &["interval"]).rejecting());
        let v2 = Arc::new(TestHandler::new("v2", 2, &["interval"]).rejecting());
        let ok = Arc::new(TestHandler::new("ok", 1, &["loglevel"]));
        let router = SettingsRouter::builder()
            .register(v1)
            .register(v2)
            .register(ok.clone())
            .build();

        let reported = router
            .process(&desired(&[("interval", "5s"), ("loglevel", "Warn")]))
            .await;

        assert!(reported.get("interval").is_none());
        assert_eq!(reported.get("loglevel"), Some(&TwinValue::from("Warn")));
    }

    #[tokio::test]
    async fn test_apply_called_once_per_touched_handler() {
        let handler = Arc::new(TestHandler::new("multi", 1, &["a", "b", "c"]));
        let untouched = Arc::new(TestHandler::new("idle", 1, &["d"]));
        let router = SettingsRouter::builder()
            .register(handler.clone())
            .register(untouched.clone())
            .build();

        router
            .process(&desired(&[("a", "1"), ("b", "2"), ("c", "3")]))
            .await;

        assert_eq!(handler.applies(), 1);
        assert_eq!(untouched.applies(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_winner_echoes_desired_value() {
        let handler = Arc::new(TestHandler::new("writeonly", 1, &["secret"]).unreadable());
        let router = SettingsRouter::builder().register(handler).build();

        let reported = router.process(&desired(&[("secret", "s3cr3t")])).await;

        assert_eq!(reported.get("secret"), Some(&TwinValue::from("s3cr3t")));
    }

    #[tokio::test]
    async fn test_supports_and_binding_count() {
        let router = SettingsRouter::builder()
            .register(Arc::new(TestHandler::new("log", 1, &["LogLevel"])))
            .build();

        assert!(router.supports("LOGLEVEL"));
        assert!(!router.supports("other"));
        assert_eq!(router.binding_count(), 1);
    }
}
