//! Error types for SwitchBot command delivery
//!
//! Contains the transport seam errors (`ConnectError`, `WriteError`,
//! `TransportError`) and the crate-level `SwitchbotError` surfaced to callers.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Transport Error Types
// ----------------------------------------------------------------------------

/// Failure to open a connection to a candidate device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Connection to {address} refused: {reason}")]
    Refused { address: String, reason: String },

    #[error("Connection to {address} timed out after {duration_ms}ms")]
    Timeout { address: String, duration_ms: u64 },

    #[error("Device {address} not found")]
    DeviceNotFound { address: String },

    #[error("Invalid device address: {address}")]
    InvalidAddress { address: String },

    #[error("BLE adapter not available: {0}")]
    AdapterUnavailable(String),
}

/// Failure to write the command payload over an open connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to write to characteristic: {0}")]
    Failed(String),

    #[error("Write timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Errors from transport housekeeping (e.g. releasing a connection)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Failed to disconnect from {address}: {reason}")]
    DisconnectFailed { address: String, reason: String },
}

/// Result of a connect call on a [`crate::BotTransport`]
pub type ConnectResult<T> = std::result::Result<T, ConnectError>;

/// Result of a characteristic write on a [`crate::BotTransport`]
pub type WriteResult = std::result::Result<(), WriteError>;

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Errors surfaced by the SwitchBot core to its callers
#[derive(Debug, Error)]
pub enum SwitchbotError {
    #[error("Unrecognized command: {token:?} (expected \"on\" or \"off\")")]
    UnrecognizedCommand { token: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Command intake closed")]
    IntakeClosed,

    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl SwitchbotError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// Result type for SwitchBot core operations
pub type Result<T> = std::result::Result<T, SwitchbotError>;
