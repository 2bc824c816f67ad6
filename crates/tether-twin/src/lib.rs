// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tether-twin
//!
//! Twin lifecycle controller and dispatch tables for TETHER.
//!
//! This crate composes the pieces an edge agent needs to keep its device
//! twin in sync with the cloud:
//!
//! - **Config**: host configuration with operation and stop timeouts
//! - **Settings**: the cascading settings dispatch table mapping desired
//!   property keys to versioned handlers
//! - **Methods**: the method dispatch table mapping RPC names to handlers
//! - **Host**: the lifecycle controller sequencing connect, reconcile,
//!   desired-update handling, and disconnect over a transport
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_twin::config::HostConfig;
//! use tether_twin::host::TwinHost;
//! use tether_twin::methods::MethodRouter;
//! use tether_twin::settings::SettingsRouter;
//!
//! let settings = Arc::new(SettingsRouter::builder().register(handler).build());
//! let methods = Arc::new(MethodRouter::builder().register(reset).build());
//! let config = HostConfig::new("supervisor").with_site_id("site-1");
//!
//! let host = TwinHost::new(factory, settings, methods, config)?;
//! host.start().await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod config;
pub mod host;
pub mod methods;
pub mod settings;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use config::HostConfig;
pub use host::{HostState, TwinHost};
pub use methods::{FaultFilter, MethodHandler, MethodRouter};
pub use settings::{SettingsHandler, SettingsRouter};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
