//! Error handling for the SwitchBot CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("SwitchBot core error: {0}")]
    Core(#[from] switchbot_core::SwitchbotError),

    #[error("BLE transport error: {0}")]
    Ble(#[from] switchbot_ble::BleTransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
