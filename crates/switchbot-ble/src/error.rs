//! Error types for BLE transport

use switchbot_core::{ConnectError, SwitchbotError};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised while setting up or driving the BLE adapter
#[derive(Error, Debug)]
pub enum BleTransportError {
    #[error("Failed to create BLE manager: {0}")]
    ManagerInit(String),

    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("BLE adapter {index} not found ({available} available)")]
    AdapterIndexOutOfRange { index: usize, available: usize },

    #[error("Failed to start BLE scan: {0}")]
    ScanFailed(String),

    #[error("Failed to list peripherals: {0}")]
    PeripheralListFailed(String),
}

impl From<BleTransportError> for ConnectError {
    fn from(err: BleTransportError) -> Self {
        ConnectError::AdapterUnavailable(err.to_string())
    }
}

impl From<BleTransportError> for SwitchbotError {
    fn from(err: BleTransportError) -> Self {
        SwitchbotError::Connect(err.into())
    }
}
