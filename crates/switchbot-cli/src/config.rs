//! SwitchBot CLI configuration management
//!
//! Configuration is layered with the priority:
//! command line arguments > `SWITCHBOT_MAC` environment variable >
//! configuration file (TOML) > defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchbot_ble::BleTransportConfig;
use switchbot_core::{
    parse_address_list, DeliveryConfig, DeviceAddress, ADDRESS_ENV_VAR, DEFAULT_DEVICE_ADDRESS,
    DEFAULT_MAX_CYCLES,
};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the SwitchBot CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Candidate devices and retry limits
    pub delivery: DeliverySettings,
    /// BLE adapter behavior
    pub ble: BleSettings,
}

/// Delivery settings as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub addresses: Vec<DeviceAddress>,
    pub max_cycles: u32,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub retry_delay_ms: u64,
}

/// BLE settings as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleSettings {
    pub scan_timeout_ms: u64,
    pub scan_poll_interval_ms: u64,
    pub write_with_response: bool,
    pub adapter_index: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            addresses: vec![DeviceAddress::from(DEFAULT_DEVICE_ADDRESS)],
            max_cycles: DEFAULT_MAX_CYCLES,
            connect_timeout_ms: 10_000,
            write_timeout_ms: 5_000,
            retry_delay_ms: 0,
        }
    }
}

impl Default for BleSettings {
    fn default() -> Self {
        Self {
            scan_timeout_ms: 5_000,
            scan_poll_interval_ms: 250,
            write_with_response: true,
            adapter_index: 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file, filling gaps with defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply the address list from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply the address list from an environment lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ADDRESS_ENV_VAR) {
            let addresses = parse_address_list(&raw);
            if !addresses.is_empty() {
                self.delivery.addresses = addresses;
            }
        }
    }

    /// Apply command line overrides
    pub fn apply_overrides(&mut self, addresses: &[String], max_cycles: Option<u32>) {
        if !addresses.is_empty() {
            self.delivery.addresses = addresses.iter().map(DeviceAddress::new).collect();
        }
        if let Some(max_cycles) = max_cycles {
            self.delivery.max_cycles = max_cycles;
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.delivery.addresses.iter().all(|a| a.as_str().trim().is_empty()) {
            return Err(CliError::Config(
                "At least one device address must be configured".to_string(),
            ));
        }

        self.delivery_config().validate()?;

        if self.ble.scan_poll_interval_ms == 0 {
            return Err(CliError::Config(
                "ble.scan_poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.ble.scan_timeout_ms >= self.delivery.connect_timeout_ms {
            return Err(CliError::Config(format!(
                "ble.scan_timeout_ms ({}) must be shorter than delivery.connect_timeout_ms ({})",
                self.ble.scan_timeout_ms, self.delivery.connect_timeout_ms
            )));
        }
        Ok(())
    }

    /// Core delivery configuration
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig::new()
            .with_addresses(
                self.delivery
                    .addresses
                    .iter()
                    .map(|a| a.as_str().trim())
                    .filter(|a| !a.is_empty()),
            )
            .with_max_cycles(self.delivery.max_cycles)
            .with_connect_timeout(Duration::from_millis(self.delivery.connect_timeout_ms))
            .with_write_timeout(Duration::from_millis(self.delivery.write_timeout_ms))
            .with_retry_delay(Duration::from_millis(self.delivery.retry_delay_ms))
    }

    /// BLE transport configuration
    pub fn ble_config(&self) -> BleTransportConfig {
        BleTransportConfig::new()
            .with_scan_timeout(Duration::from_millis(self.ble.scan_timeout_ms))
            .with_scan_poll_interval(Duration::from_millis(self.ble.scan_poll_interval_ms))
            .with_write_response(self.ble.write_with_response)
            .with_adapter_index(self.ble.adapter_index)
    }
}
