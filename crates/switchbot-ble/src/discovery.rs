//! BLE adapter setup and candidate discovery
//!
//! Resolves configured device addresses to btleplug peripherals by polling
//! the adapter's peripheral list while a scan is running.

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use switchbot_core::{ConnectError, ConnectResult, DeviceAddress};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::BleTransportConfig;
use crate::error::BleTransportError;
use crate::protocol::{address_matches, SWITCHBOT_SERVICE_UUID};
use crate::release::ReleaseGuard;

// ----------------------------------------------------------------------------
// Discovered Devices
// ----------------------------------------------------------------------------

/// A peripheral seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Hardware address (or platform id where the address is hidden)
    pub address: DeviceAddress,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Advertises the SwitchBot service
    pub is_switchbot: bool,
}

// ----------------------------------------------------------------------------
// Discovery Implementation
// ----------------------------------------------------------------------------

/// Owns the host adapter and finds peripherals on it
pub struct BleDiscovery {
    config: BleTransportConfig,
    adapter: Adapter,
}

impl BleDiscovery {
    /// Initialize the configured BLE adapter
    pub async fn initialize(config: BleTransportConfig) -> Result<Self, BleTransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleTransportError::ManagerInit(e.to_string()))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| BleTransportError::ManagerInit(e.to_string()))?;

        if adapters.is_empty() {
            return Err(BleTransportError::AdapterNotAvailable);
        }

        let available = adapters.len();
        let adapter = adapters
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleTransportError::AdapterIndexOutOfRange {
                index: config.adapter_index,
                available,
            })?;

        match adapter.adapter_info().await {
            Ok(info) => info!("BLE adapter initialized: {}", info),
            Err(_) => info!("BLE adapter initialized"),
        }

        Ok(Self { config, adapter })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Start scanning; the returned guard stops the scan
    async fn start_scan(&self) -> Result<ReleaseGuard, BleTransportError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| BleTransportError::ScanFailed(e.to_string()))?;

        let adapter = self.adapter.clone();
        Ok(ReleaseGuard::new("BLE scan", async move {
            if let Err(e) = adapter.stop_scan().await {
                warn!("Failed to stop BLE scan: {}", e);
            }
        }))
    }

    /// Scan until a peripheral answering to `address` shows up
    pub async fn find_peripheral(&self, address: &DeviceAddress) -> ConnectResult<Peripheral> {
        let scan = self.start_scan().await?;

        let deadline = Instant::now() + self.config.scan_timeout;
        let found = loop {
            match self.lookup(address).await {
                Ok(Some(peripheral)) => break Ok(Some(peripheral)),
                Ok(None) => {}
                Err(e) => break Err(e),
            }
            if Instant::now() >= deadline {
                break Ok(None);
            }
            sleep(self.config.scan_poll_interval).await;
        };

        scan.release().await;

        match found? {
            Some(peripheral) => {
                debug!(%address, "Found peripheral");
                Ok(peripheral)
            }
            None => Err(ConnectError::DeviceNotFound {
                address: address.to_string(),
            }),
        }
    }

    /// Check the peripherals the adapter currently knows about
    async fn lookup(&self, address: &DeviceAddress) -> ConnectResult<Option<Peripheral>> {
        let peripherals = self.adapter.peripherals().await.map_err(|e| {
            ConnectError::from(BleTransportError::PeripheralListFailed(e.to_string()))
        })?;

        Ok(peripherals.into_iter().find(|p| {
            address_matches(address, &p.address().to_string(), &p.id().to_string())
        }))
    }

    /// Scan for `duration` and report every peripheral seen
    pub async fn scan(
        &self,
        duration: std::time::Duration,
    ) -> Result<Vec<DiscoveredDevice>, BleTransportError> {
        let scan = self.start_scan().await?;
        info!("Scanning for BLE devices for {:?}", duration);
        sleep(duration).await;

        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| BleTransportError::PeripheralListFailed(e.to_string()));

        scan.release().await;

        let mut devices = Vec::new();
        for peripheral in peripherals? {
            let properties = match peripheral.properties().await {
                Ok(Some(properties)) => properties,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Skipping peripheral {}: {}", peripheral.id(), e);
                    continue;
                }
            };

            let hardware_address = properties.address.to_string();
            let address = if properties.address.into_inner() == [0u8; 6] {
                DeviceAddress::from(peripheral.id().to_string())
            } else {
                DeviceAddress::from(hardware_address)
            };

            devices.push(DiscoveredDevice {
                address,
                name: properties.local_name,
                rssi: properties.rssi,
                is_switchbot: properties.services.contains(&SWITCHBOT_SERVICE_UUID),
            });
        }

        // SwitchBots first, then strongest signal
        devices.sort_by(|a, b| {
            b.is_switchbot
                .cmp(&a.is_switchbot)
                .then_with(|| b.rssi.cmp(&a.rssi))
        });
        Ok(devices)
    }
}
