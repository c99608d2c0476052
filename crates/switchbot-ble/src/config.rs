//! BLE transport configuration

use std::time::Duration;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the BLE transport
///
/// `scan_timeout` should stay below the delivery connect timeout, since the
/// scan for a candidate runs inside the connect attempt.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BleTransportConfig {
    /// Maximum time to scan for a candidate address
    pub scan_timeout: Duration,
    /// Interval between peripheral list polls while scanning
    pub scan_poll_interval: Duration,
    /// Request a write response from the Bot
    pub write_with_response: bool,
    /// Index of the host adapter to use
    pub adapter_index: usize,
}

impl Default for BleTransportConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(5),
            scan_poll_interval: Duration::from_millis(250),
            write_with_response: true,
            adapter_index: 0,
        }
    }
}

impl BleTransportConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set scan poll interval
    pub fn with_scan_poll_interval(mut self, interval: Duration) -> Self {
        self.scan_poll_interval = interval;
        self
    }

    /// Enable or disable write-with-response
    pub fn with_write_response(mut self, enabled: bool) -> Self {
        self.write_with_response = enabled;
        self
    }

    /// Select the host adapter
    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }
}
