//! Delivery configuration

use std::time::Duration;

use uuid::Uuid;

use crate::command::SWITCHBOT_WRITE_CHARACTERISTIC_UUID;
use crate::errors::{Result, SwitchbotError};
use crate::transport::DeviceAddress;

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

/// Fallback address used when no candidates are configured
pub const DEFAULT_DEVICE_ADDRESS: &str = "CE:2A:46:46:22:76";

/// Environment variable holding the candidate address list
pub const ADDRESS_ENV_VAR: &str = "SWITCHBOT_MAC";

/// Number of full sweeps over the candidate list before giving up
pub const DEFAULT_MAX_CYCLES: u32 = 10;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Immutable configuration for the delivery coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryConfig {
    /// Candidate addresses, tried in order within each cycle
    pub addresses: Vec<DeviceAddress>,
    /// Maximum number of cycles over the candidate list
    pub max_cycles: u32,
    /// Upper bound on a single connect attempt
    pub connect_timeout: Duration,
    /// Upper bound on a single characteristic write
    pub write_timeout: Duration,
    /// Pause between cycles
    pub retry_delay: Duration,
    /// Characteristic receiving the command payload
    pub characteristic: Uuid,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            addresses: vec![DeviceAddress::from(DEFAULT_DEVICE_ADDRESS)],
            max_cycles: DEFAULT_MAX_CYCLES,
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            retry_delay: Duration::ZERO,
            characteristic: SWITCHBOT_WRITE_CHARACTERISTIC_UUID,
        }
    }
}

impl DeliveryConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set candidate addresses
    pub fn with_addresses<I, A>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<DeviceAddress>,
    {
        self.addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Set the cycle limit
    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set delay between cycles
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the target characteristic
    pub fn with_characteristic(mut self, characteristic: Uuid) -> Self {
        self.characteristic = characteristic;
        self
    }

    /// Check limits before any delivery is attempted
    pub fn validate(&self) -> Result<()> {
        if self.max_cycles == 0 {
            return Err(SwitchbotError::invalid_config(
                "max_cycles must be at least 1",
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(SwitchbotError::invalid_config(
                "connect_timeout must be non-zero",
            ));
        }
        if self.write_timeout.is_zero() {
            return Err(SwitchbotError::invalid_config(
                "write_timeout must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Split a comma or whitespace separated address list, dropping empty entries
pub fn parse_address_list(raw: &str) -> Vec<DeviceAddress> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(DeviceAddress::from)
        .collect()
}
