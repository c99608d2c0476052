//! Bluetooth Low Energy transport for SwitchBot Bots
//!
//! This crate implements the `BotTransport` trait from `switchbot-core` on
//! top of btleplug, so the delivery coordinator can drive real devices.
//!
//! ## Architecture
//!
//! - [`config`] - Transport configuration and settings
//! - [`error`] - Error types specific to BLE transport
//! - [`protocol`] - SwitchBot UUIDs and address matching
//! - [`discovery`] - Adapter setup, address resolution and scanning
//! - [`connection`] - Connected peripheral handle
//! - `release` - Cleanup of scans and links abandoned by a timed-out connect
//! - [`transport`] - Main transport implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchbot_ble::{BleBotTransport, BleTransportConfig};
//! use switchbot_core::{Command, DeliveryConfig, DeliveryCoordinator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = BleBotTransport::new(BleTransportConfig::new()).await?;
//! let coordinator = DeliveryCoordinator::new(Arc::new(transport), DeliveryConfig::new());
//!
//! let outcome = coordinator.deliver(Command::Off).await;
//! println!("{}", outcome);
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod discovery;
mod error;
mod protocol;
mod release;
mod transport;

// Public API exports
pub use config::BleTransportConfig;
pub use connection::BleConnection;
pub use discovery::DiscoveredDevice;
pub use error::BleTransportError;
pub use protocol::{address_matches, SWITCHBOT_SERVICE_UUID, SWITCHBOT_WRITE_CHARACTERISTIC_UUID};
pub use transport::BleBotTransport;
