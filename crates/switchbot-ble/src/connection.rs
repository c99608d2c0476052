//! Open BLE connection to a single Bot

use btleplug::api::{Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use switchbot_core::{DeviceAddress, TransportError, WriteError, WriteResult};
use tracing::{debug, info};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Connection Handle
// ----------------------------------------------------------------------------

/// Connected peripheral, owned by one delivery attempt
#[derive(Debug)]
pub struct BleConnection {
    address: DeviceAddress,
    peripheral: Peripheral,
    write_type: WriteType,
}

impl BleConnection {
    pub(crate) fn new(address: DeviceAddress, peripheral: Peripheral, write_type: WriteType) -> Self {
        Self {
            address,
            peripheral,
            write_type,
        }
    }

    /// Write `data` to the characteristic with the given UUID
    pub async fn write(&self, characteristic: Uuid, data: &[u8]) -> WriteResult {
        let characteristics = self.peripheral.characteristics();
        let target = characteristics
            .iter()
            .find(|c| c.uuid == characteristic)
            .ok_or_else(|| WriteError::CharacteristicNotFound {
                characteristic: characteristic.to_string(),
            })?;

        self.peripheral
            .write(target, data, self.write_type)
            .await
            .map_err(|e| WriteError::Failed(e.to_string()))?;

        debug!(address = %self.address, "Wrote {} bytes to {}", data.len(), characteristic);
        Ok(())
    }

    /// Disconnect from the peripheral
    pub async fn close(self) -> Result<(), TransportError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| TransportError::DisconnectFailed {
                address: self.address.to_string(),
                reason: e.to_string(),
            })?;
        info!("Disconnected from Bot at {}", self.address);
        Ok(())
    }
}
