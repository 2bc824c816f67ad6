// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tether-registry
//!
//! Entity identity derivation and registration records for TETHER.
//!
//! Every entity the registry tracks (applications, endpoints, edge modules,
//! gateways) gets a deterministic identity derived from its immutable
//! business keys, so re-registering the same entity always collapses onto
//! the same record:
//!
//! - **Identity**: pure id-derivation functions and the enums that
//!   parameterize them
//! - **Records**: registration record snapshots with value-wise equality,
//!   validation, and drift marking
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_registry::identity;
//!
//! let app = identity::application_id(Some("site-1"), "urn:Example:Device", None);
//! let same = identity::application_id(Some("site-1"), "URN:EXAMPLE:DEVICE", None);
//! assert_eq!(app, same);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod identity;
pub mod records;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use identity::{
    application_id, endpoint_id, gateway_id, module_entity_id, parse_module_entity_id,
    ApplicationType, SecurityMode,
};
pub use records::{
    ApplicationRecord, EndpointRecord, EntityKind, GatewayRecord, ModuleRecord,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
