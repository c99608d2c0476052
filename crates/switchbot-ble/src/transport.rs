//! `BotTransport` implementation over btleplug

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Peripheral as _, WriteType};
use switchbot_core::{
    BotTransport, ConnectError, ConnectResult, DeviceAddress, Payload, TransportError, WriteResult,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BleTransportConfig;
use crate::connection::BleConnection;
use crate::discovery::{BleDiscovery, DiscoveredDevice};
use crate::error::BleTransportError;
use crate::release::ReleaseGuard;

// ----------------------------------------------------------------------------
// BLE Transport
// ----------------------------------------------------------------------------

/// BLE transport for SwitchBot Bots
pub struct BleBotTransport {
    config: BleTransportConfig,
    discovery: BleDiscovery,
}

impl BleBotTransport {
    /// Initialize the host adapter selected by `config`
    pub async fn new(config: BleTransportConfig) -> Result<Self, BleTransportError> {
        let discovery = BleDiscovery::initialize(config.clone()).await?;
        Ok(Self { config, discovery })
    }

    pub fn config(&self) -> &BleTransportConfig {
        &self.config
    }

    /// List nearby peripherals, SwitchBots first
    pub async fn scan(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>, BleTransportError> {
        self.discovery.scan(duration).await
    }

    fn write_type(&self) -> WriteType {
        if self.config.write_with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        }
    }
}

#[async_trait]
impl BotTransport for BleBotTransport {
    type Connection = BleConnection;

    async fn connect(&self, address: &DeviceAddress) -> ConnectResult<BleConnection> {
        let peripheral = self.discovery.find_peripheral(address).await?;

        let refused = |reason: String| ConnectError::Refused {
            address: address.to_string(),
            reason,
        };

        // A link left over from an abandoned attempt is never reused
        if peripheral.is_connected().await.unwrap_or(false) {
            warn!(%address, "Dropping stale connection before reconnecting");
            if let Err(e) = peripheral.disconnect().await {
                warn!(%address, "Failed to drop stale connection: {}", e);
            }
        }

        // Disconnects if this future is dropped before the link is handed over
        let link = ReleaseGuard::new("BLE link", {
            let peripheral = peripheral.clone();
            let address = address.clone();
            async move {
                debug!(%address, "Releasing unfinished connection");
                if let Err(e) = peripheral.disconnect().await {
                    warn!(%address, "Failed to release connection: {}", e);
                }
            }
        });

        if let Err(e) = peripheral.connect().await {
            link.disarm();
            return Err(refused(e.to_string()));
        }

        if let Err(e) = peripheral.discover_services().await {
            link.release().await;
            return Err(refused(format!("Failed to discover services: {}", e)));
        }

        link.disarm();
        info!(%address, "Connected.");
        Ok(BleConnection::new(address.clone(), peripheral, self.write_type()))
    }

    async fn write_characteristic(
        &self,
        connection: &mut BleConnection,
        characteristic: Uuid,
        payload: &Payload,
    ) -> WriteResult {
        connection.write(characteristic, payload.as_bytes()).await
    }

    async fn disconnect(&self, connection: BleConnection) -> Result<(), TransportError> {
        connection.close().await
    }
}
