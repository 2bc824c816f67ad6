// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Twin host configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tether_core::error::{HostError, HostResult};

// =============================================================================
// Constants
// =============================================================================

/// Default timeout for transport operations.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default shortened timeout for the final disconnect on stop.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// HostConfig
// =============================================================================

/// Configuration for a twin host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Entity kind reported as the `__type__` infrastructure value.
    ///
    /// Must be lowercase; registry-side twin queries match on it.
    pub entity_type: String,

    /// Site the agent belongs to, when known at startup. The cloud may
    /// assign or change it later through the `__siteid__` desired value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    /// Timeout applied to transport operations while running.
    #[serde(with = "duration_millis", default = "default_operation_timeout")]
    pub operation_timeout: Duration,

    /// Shortened timeout applied to the disconnect on stop, so teardown
    /// never hangs on a dead channel.
    #[serde(with = "duration_millis", default = "default_stop_timeout")]
    pub stop_timeout: Duration,
}

fn default_operation_timeout() -> Duration {
    DEFAULT_OPERATION_TIMEOUT
}

fn default_stop_timeout() -> Duration {
    DEFAULT_STOP_TIMEOUT
}

impl HostConfig {
    /// Creates a configuration for the given entity type with default
    /// timeouts and no site.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            site_id: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Sets the initial site id.
    pub fn with_site_id(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    /// Sets the operation timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `HostError::InvalidConfig` when the entity type is empty or
    /// not lowercase, or when a timeout is zero.
    pub fn validate(&self) -> HostResult<()> {
        if self.entity_type.is_empty() {
            return Err(HostError::invalid_config(
                "entity_type",
                "must not be empty",
            ));
        }
        if self.entity_type.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(HostError::invalid_config(
                "entity_type",
                "must be lowercase",
            ));
        }
        if self.operation_timeout.is_zero() {
            return Err(HostError::invalid_config(
                "operation_timeout",
                "must be greater than zero",
            ));
        }
        if self.stop_timeout.is_zero() {
            return Err(HostError::invalid_config(
                "stop_timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Serialization helper for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// =============================================================================
// Tests
// =============================================================================
