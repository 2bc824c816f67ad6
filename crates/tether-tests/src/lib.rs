// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # TETHER Integration Tests
//!
//! This crate provides comprehensive integration tests for the TETHER
//! device-twin synchronization layer. It includes test utilities,
//! fixtures, and mock transports designed for extensibility and
//! maintainability.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities, fixtures, and helpers
//!   - `fixtures`: Pre-built twin snapshots and registration records
//!   - `mocks`: Mock transport, settings, and method implementations
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p tether-tests
//!
//! # Run specific test suite
//! cargo test -p tether-tests --test integration_twin
//! cargo test -p tether-tests --test integration_registry
//! cargo test -p tether-tests --test integration_dispatch
//!
//! # Run with verbose output
//! cargo test -p tether-tests -- --nocapture
//!
//! # Run specific test
//! cargo test -p tether-tests test_reconcile_resolves_log_level_drift
//! ```
//!
//! ## Test Categories
//!
//! ### Twin Tests (`integration_twin.rs`)
//! - Host lifecycle (start, stop, restart)
//! - Handler registration ordering
//! - Initial reconciliation and drift resolution
//! - Desired-update processing and patch minimization
//! - Telemetry envelopes, reported writes, and blob uploads
//!
//! ### Registry Tests (`integration_registry.rs`)
//! - Deterministic entity identity derivation
//! - Registration record equality and hashing
//! - Record validation rules
//! - Liveness metadata and in-sync tracking
//!
//! ### Dispatch Tests (`integration_dispatch.rs`)
//! - Settings cascade across handler versions
//! - Catch-all bindings and unmatched keys
//! - Method routing, name normalization, and status codes
//! - Fault filtering and payload ceilings

pub mod common;
