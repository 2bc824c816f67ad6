// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Method dispatch table.
//!
//! Maps RPC method names to candidate handlers. Names match
//! case-insensitively with one trailing "Async" suffix stripped, so
//! "Restart", "restart", and "RestartAsync" all address the same method.
//! Versioned names like "reset_v2" stay distinct.
//!
//! Every fault is converted into a wire response; nothing ever throws out
//! of the dispatch table into the transport callback.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument, warn};

use tether_core::error::{MethodError, MethodResult};
use tether_core::transport::{MethodCallHandler, MethodResponse};

// =============================================================================
// Constants
// =============================================================================

/// Status of a successful invocation.
pub const STATUS_OK: u16 = 200;

/// Status of a fault mapped by the fault filter.
pub const STATUS_FAULT: u16 = 400;

/// Status of a response over the size ceiling.
pub const STATUS_TOO_LARGE: u16 = 413;

/// Status of a business fault carrying its own payload.
pub const STATUS_BUSINESS_FAULT: u16 = 429;

/// Status of a call to an unregistered method.
pub const STATUS_NOT_IMPLEMENTED: u16 = 501;

/// Ceiling on method response payloads. Transport method responses cap
/// at 128 KiB; staying below leaves room for framing.
pub const MAX_RESPONSE_SIZE: usize = 127 * 1024;

const ASYNC_SUFFIX: &str = "async";

// =============================================================================
// MethodHandler Trait
// =============================================================================

/// A handler serving one method name.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Returns the method name this handler serves.
    fn name(&self) -> &str;

    /// Invokes the method and returns the serialized result.
    ///
    /// # Errors
    ///
    /// Returns a `MethodError` on failure. A
    /// [`BusinessFault`](MethodError::BusinessFault) carries its own
    /// response payload; every other error goes through the fault filter.
    async fn invoke(&self, payload: &[u8]) -> MethodResult<Vec<u8>>;
}

// =============================================================================
// Fault Filter
// =============================================================================

/// Maps a handler error to the wire response when no candidate succeeded.
pub trait FaultFilter: Send + Sync {
    /// Produces the fault response for the given method and error.
    fn filter(&self, name: &str, error: &MethodError) -> MethodResponse;
}

/// The default filter: status 400 with a JSON body naming the fault.
#[derive(Debug, Default)]
pub struct DefaultFaultFilter;

impl FaultFilter for DefaultFaultFilter {
    fn filter(&self, _name: &str, error: &MethodError) -> MethodResponse {
        let body = serde_json::to_vec(&json!({
            "Message": error.to_string(),
            "Details": error.error_type(),
        }))
        .unwrap_or_default();
        MethodResponse::with_status(STATUS_FAULT, body)
    }
}

// =============================================================================
// MethodRouter
// =============================================================================

/// The method dispatch table.
///
/// Built once at process start via [`MethodRouter::builder`] and immutable
/// afterwards. Implements [`MethodCallHandler`] so it plugs directly into a
/// transport.
pub struct MethodRouter {
    table: HashMap<String, Vec<Arc<dyn MethodHandler>>>,
    fault_filter: Arc<dyn FaultFilter>,
}

impl MethodRouter {
    /// Starts building a router with the default fault filter.
    pub fn builder() -> MethodRouterBuilder {
        MethodRouterBuilder {
            table: HashMap::new(),
            fault_filter: Arc::new(DefaultFaultFilter),
        }
    }

    /// Returns `true` when a handler is registered for the name.
    pub fn supports(&self, name: &str) -> bool {
        self.table.contains_key(&normalize(name))
    }

    /// Returns the number of distinct method names.
    pub fn method_count(&self) -> usize {
        self.table.len()
    }

    /// Dispatches one method call and produces the wire response.
    ///
    /// Candidates for the name are tried in registration order; the first
    /// successful one wins. When every candidate fails, the first error
    /// decides the response: a business fault becomes status 429 with the
    /// fault's own payload, everything else goes through the fault filter.
    #[instrument(skip(self, payload), fields(method = %name, payload_len = payload.len()))]
    pub async fn dispatch(&self, name: &str, payload: &[u8]) -> MethodResponse {
        let Some(candidates) = self.table.get(&normalize(name)) else {
            debug!("Method not registered");
            return MethodResponse::with_status(STATUS_NOT_IMPLEMENTED, Vec::new());
        };

        let mut first_error: Option<MethodError> = None;
        for handler in candidates {
            match handler.invoke(payload).await {
                Ok(result) => {
                    if result.len() > MAX_RESPONSE_SIZE {
                        warn!(
                            size = result.len(),
                            limit = MAX_RESPONSE_SIZE,
                            "Method response over size ceiling"
                        );
                        return MethodResponse::with_status(STATUS_TOO_LARGE, Vec::new());
                    }
                    return MethodResponse::ok(result);
                }
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        let error = first_error.unwrap_or_else(|| MethodError::NotSupported {
            name: name.to_string(),
        });
        match error {
            MethodError::BusinessFault { payload } => {
                debug!("Method signaled business fault");
                MethodResponse::with_status(STATUS_BUSINESS_FAULT, payload)
            }
            MethodError::ResponseTooLarge { size, limit } => {
                warn!(size, limit, "Method response over size ceiling");
                MethodResponse::with_status(STATUS_TOO_LARGE, Vec::new())
            }
            error => {
                warn!(error = %error, "Method invocation failed");
                self.fault_filter.filter(name, &error)
            }
        }
    }
}

#[async_trait]
impl MethodCallHandler for MethodRouter {
    async fn on_method_call(&self, name: &str, payload: &[u8]) -> MethodResponse {
        self.dispatch(name, payload).await
    }
}

/// Normalizes a method name: lowercase with one trailing "Async" stripped.
fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    match lowered.strip_suffix(ASYNC_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => lowered,
    }
}

// =============================================================================
// MethodRouterBuilder
// =============================================================================

/// Builder collecting method registrations.
pub struct MethodRouterBuilder {
    table: HashMap<String, Vec<Arc<dyn MethodHandler>>>,
    fault_filter: Arc<dyn FaultFilter>,
}

impl MethodRouterBuilder {
    /// Registers a handler under its normalized method name.
    pub fn register(mut self, handler: Arc<dyn MethodHandler>) -> Self {
        self.table
            .entry(normalize(handler.name()))
            .or_default()
            .push(handler);
        self
    }

    /// Replaces the fault filter.
    pub fn with_fault_filter(mut self, filter: Arc<dyn FaultFilter>) -> Self {
        self.fault_filter = filter;
        self
    }

    /// Finalizes the dispatch table.
    pub fn build(self) -> MethodRouter {
        MethodRouter {
            table: self.table,
            fault_filter: self.fault_filter,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
