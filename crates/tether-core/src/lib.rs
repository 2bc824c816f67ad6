// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tether-core
//!
//! Core abstractions and shared types for TETHER device-twin synchronization.
//!
//! This crate provides the foundational types, traits, and utilities used
//! across all TETHER components including:
//!
//! - **Types**: Identity types like `DeviceId`, `ModuleId`, `TwinIdentity`
//! - **Value**: Dynamically-typed twin values and property sets with
//!   merge/remove semantics
//! - **Error**: Unified error hierarchy
//! - **Transport**: The channel abstraction the twin controller runs over
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_core::value::{TwinPropertySet, TwinValue};
//!
//! let mut reported = TwinPropertySet::new();
//! reported.insert("logLevel", "Info");
//!
//! let mut patch = TwinPropertySet::new();
//! patch.insert("logLevel", "Debug");
//! patch.insert("stale", TwinValue::Null);
//!
//! reported.merge(&patch);
//! assert_eq!(reported.get("logLevel"), Some(&TwinValue::from("Debug")));
//! assert!(reported.get("stale").is_none());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod types;
pub mod value;

// =============================================================================
// Transport Module
// =============================================================================

pub mod transport;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::*;
pub use types::*;
pub use value::*;

// Re-export commonly used transport types
pub use transport::{
    DesiredUpdateHandler, MethodCallHandler, MethodResponse, TelemetryMessage, TransportFactory,
    TwinSnapshot, TwinTransport,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
