//! Transport capability used by the delivery coordinator
//!
//! A `BotTransport` hides every BLE protocol detail (scanning, GATT traversal,
//! MTU) behind three calls: connect, write one characteristic, disconnect.

use core::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::Payload;
use crate::errors::{ConnectResult, TransportError, WriteResult};

// ----------------------------------------------------------------------------
// Device Address
// ----------------------------------------------------------------------------

/// Opaque identifier of a candidate device, usually a hardware address string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Wrap an address string
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Address as given in configuration
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for DeviceAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Minimal BLE capability surface driven by the delivery coordinator
///
/// Every successful `connect` is followed by exactly one `disconnect` of the
/// returned handle. Handles are never shared between attempts.
#[async_trait]
pub trait BotTransport: Send + Sync {
    /// Open connection handle, owned by one attempt
    type Connection: Send;

    /// Open a connection to the device at `address`
    ///
    /// The coordinator drops this future when the connect timeout fires, so
    /// anything it has opened by then (a link, a running scan) must be
    /// released on drop.
    async fn connect(&self, address: &DeviceAddress) -> ConnectResult<Self::Connection>;

    /// Write `payload` to `characteristic` over an open connection
    async fn write_characteristic(
        &self,
        connection: &mut Self::Connection,
        characteristic: Uuid,
        payload: &Payload,
    ) -> WriteResult;

    /// Release a connection
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), TransportError>;
}
