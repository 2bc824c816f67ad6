// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for TETHER.
//!
//! This module defines the error type system shared by all crates:
//!
//! - Provides clear, descriptive error messages
//! - Supports error chaining for traceability
//! - Distinguishes between retryable and non-retryable errors
//! - Supports structured logging
//!
//! # Error Hierarchy
//!
//! ```text
//! TetherError (root)
//! ├── TransportError  - Twin channel operations
//! ├── ValueError      - Twin value typing and serialization
//! ├── SettingsError   - Settings dispatch and handlers
//! ├── MethodError     - Method dispatch and handlers
//! ├── RegistryError   - Registration record validation
//! └── HostError       - Twin controller lifecycle
//! ```
//!
//! # Examples
//!
//! ```
//! use tether_core::error::{TetherError, TransportError};
//! use std::time::Duration;
//!
//! let error = TransportError::timeout(Duration::from_secs(5));
//! assert!(error.is_retryable());
//!
//! let root: TetherError = error.into();
//! assert!(root.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// TetherError - Root Error Type
// =============================================================================

/// The root error type for TETHER.
///
/// All errors in TETHER can be converted to this type, providing a unified
/// error handling interface across the entire system.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Twin transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Twin value error.
    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    /// Settings dispatch error.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Method dispatch error.
    #[error("Method error: {0}")]
    Method(#[from] MethodError),

    /// Registry record error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Twin controller error.
    #[error("Host error: {0}")]
    Host(#[from] HostError),
}

impl TetherError {
    /// Returns `true` if this error is retryable.
    ///
    /// Retryable errors are typically transient issues that may succeed
    /// on a subsequent attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TetherError::Transport(e) => e.is_retryable(),
            TetherError::Host(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the error type as a string for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            TetherError::Transport(_) => "transport",
            TetherError::Value(_) => "value",
            TetherError::Settings(_) => "settings",
            TetherError::Method(_) => "method",
            TetherError::Registry(_) => "registry",
            TetherError::Host(_) => "host",
        }
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Twin transport channel errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting the twin channel failed.
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The channel is not connected.
    #[error("Transport is not connected")]
    NotConnected,

    /// A channel operation timed out.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The timeout duration.
        duration: Duration,
    },

    /// Fetching the twin document failed.
    #[error("Twin fetch failed: {message}")]
    FetchFailed {
        /// Error message.
        message: String,
    },

    /// Sending a patch or telemetry message failed.
    #[error("Send failed: {message}")]
    SendFailed {
        /// Error message.
        message: String,
    },

    /// A blob upload failed.
    #[error("Upload of '{name}' failed: {message}")]
    UploadFailed {
        /// The blob name.
        name: String,
        /// Error message.
        message: String,
    },

    /// The channel was closed and cannot be reused.
    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    /// Creates a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a connection failed error with a source.
    pub fn connection_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates a fetch failed error.
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed {
            message: message.into(),
        }
    }

    /// Creates a send failed error.
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed {
            message: message.into(),
        }
    }

    /// Creates an upload failed error.
    pub fn upload_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UploadFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Closed)
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            TransportError::ConnectionFailed { .. } => "connection_failed",
            TransportError::NotConnected => "not_connected",
            TransportError::Timeout { .. } => "timeout",
            TransportError::FetchFailed { .. } => "fetch_failed",
            TransportError::SendFailed { .. } => "send_failed",
            TransportError::UploadFailed { .. } => "upload_failed",
            TransportError::Closed => "closed",
        }
    }
}

// =============================================================================
// ValueError
// =============================================================================

/// Twin value typing and serialization errors.
#[derive(Debug, Error)]
pub enum ValueError {
    /// A typed accessor was used on the wrong variant.
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The expected type name.
        expected: &'static str,
        /// The actual type name.
        actual: &'static str,
    },

    /// A required map key is missing.
    #[error("Missing key: {key}")]
    MissingKey {
        /// The missing key.
        key: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("Serialization failed: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl ValueError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// Creates a missing key error.
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ValueError::TypeMismatch { .. } => "type_mismatch",
            ValueError::MissingKey { .. } => "missing_key",
            ValueError::Serialization { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for ValueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// SettingsError
// =============================================================================

/// Settings dispatch and handler errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// No handler claims this property key.
    #[error("Property '{key}' is not supported")]
    NotSupported {
        /// The property key.
        key: String,
    },

    /// The handler cannot read this property back.
    #[error("Property '{key}' is not readable")]
    NotReadable {
        /// The property key.
        key: String,
    },

    /// The handler rejected the property value.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue {
        /// The property key.
        key: String,
        /// Error message.
        message: String,
    },

    /// Applying accumulated changes on a handler failed.
    #[error("Apply failed: {message}")]
    ApplyFailed {
        /// Error message.
        message: String,
    },

    /// A value typing error inside a handler.
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl SettingsError {
    /// Creates a not supported error.
    pub fn not_supported(key: impl Into<String>) -> Self {
        Self::NotSupported { key: key.into() }
    }

    /// Creates a not readable error.
    pub fn not_readable(key: impl Into<String>) -> Self {
        Self::NotReadable { key: key.into() }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an apply failed error.
    pub fn apply_failed(message: impl Into<String>) -> Self {
        Self::ApplyFailed {
            message: message.into(),
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            SettingsError::NotSupported { .. } => "not_supported",
            SettingsError::NotReadable { .. } => "not_readable",
            SettingsError::InvalidValue { .. } => "invalid_value",
            SettingsError::ApplyFailed { .. } => "apply_failed",
            SettingsError::Value(_) => "value",
        }
    }
}

// =============================================================================
// MethodError
// =============================================================================

/// Method dispatch and handler errors.
#[derive(Debug, Error)]
pub enum MethodError {
    /// No handler is registered for this method name.
    #[error("Method '{name}' is not supported")]
    NotSupported {
        /// The requested method name.
        name: String,
    },

    /// The request payload could not be interpreted.
    #[error("Invalid payload: {message}")]
    InvalidPayload {
        /// Error message.
        message: String,
    },

    /// A fault carrying its own response payload for the caller.
    #[error("Business fault carrying {} response bytes", payload.len())]
    BusinessFault {
        /// The serialized fault response.
        payload: Vec<u8>,
    },

    /// The serialized response exceeds the transport ceiling.
    #[error("Response of {size} bytes exceeds the {limit} byte limit")]
    ResponseTooLarge {
        /// Serialized response size.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// The handler failed while executing.
    #[error("Execution failed: {message}")]
    ExecutionFailed {
        /// Error message.
        message: String,
    },
}

impl MethodError {
    /// Creates an invalid payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Creates a business fault carrying a response payload.
    pub fn business_fault(payload: impl Into<Vec<u8>>) -> Self {
        Self::BusinessFault {
            payload: payload.into(),
        }
    }

    /// Creates an execution failed error.
    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            MethodError::NotSupported { .. } => "not_supported",
            MethodError::InvalidPayload { .. } => "invalid_payload",
            MethodError::BusinessFault { .. } => "business_fault",
            MethodError::ResponseTooLarge { .. } => "response_too_large",
            MethodError::ExecutionFailed { .. } => "execution_failed",
        }
    }
}

impl From<serde_json::Error> for MethodError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// RegistryError
// =============================================================================

/// Registration record validation errors.
///
/// Raised when a record is registered with malformed or missing business
/// keys. Identity derivation itself never fails; violations surface here.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// A URI field does not hold an absolute URI.
    #[error("Field '{field}' holds invalid URI '{value}'")]
    InvalidUri {
        /// The field name.
        field: String,
        /// The offending value.
        value: String,
    },

    /// Record validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl RegistryError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid URI error.
    pub fn invalid_uri(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidUri {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            RegistryError::MissingField { .. } => "missing_field",
            RegistryError::InvalidUri { .. } => "invalid_uri",
            RegistryError::Validation { .. } => "validation",
        }
    }
}

// =============================================================================
// HostError
// =============================================================================

/// Twin controller lifecycle errors.
#[derive(Debug, Error)]
pub enum HostError {
    /// Start was called while a session is already running.
    #[error("Already started")]
    AlreadyStarted,

    /// A send or report was attempted without a running session.
    #[error("Not started")]
    NotStarted,

    /// The host configuration is invalid.
    #[error("Invalid configuration for '{field}': {message}")]
    InvalidConfig {
        /// The configuration field.
        field: String,
        /// Error message.
        message: String,
    },

    /// A transport operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HostError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            HostError::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            HostError::AlreadyStarted => "already_started",
            HostError::NotStarted => "not_started",
            HostError::InvalidConfig { .. } => "invalid_config",
            HostError::Transport(_) => "transport",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// A Result type with TetherError.
pub type TetherResult<T> = Result<T, TetherError>;

/// A Result type with TransportError.
pub type TransportResult<T> = Result<T, TransportError>;

/// A Result type with ValueError.
pub type ValueResult<T> = Result<T, ValueError>;

/// A Result type with SettingsError.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// A Result type with MethodError.
pub type MethodResult<T> = Result<T, MethodError>;

/// A Result type with RegistryError.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A Result type with HostError.
pub type HostResult<T> = Result<T, HostError>;

// =============================================================================
// Tests
// =============================================================================
