//! Core command delivery for SwitchBot BLE actuators
//!
//! This crate turns an abstract `on`/`off` command into a write on the Bot's
//! GATT characteristic, trying each configured candidate address in turn and
//! repeating the sweep for a bounded number of cycles.
//!
//! ## Architecture
//!
//! - [`command`] - Command codec and payload table
//! - [`transport`] - Capability trait implemented by BLE adapters
//! - [`delivery`] - Delivery coordinator, attempts and outcomes
//! - [`intake`] - Single-worker queue feeding the coordinator
//! - [`config`] - Immutable delivery configuration
//! - [`errors`] - Error taxonomy
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchbot_core::{BotTransport, Command, DeliveryConfig, DeliveryCoordinator};
//!
//! # async fn example<T: BotTransport>(transport: T) -> Result<(), switchbot_core::SwitchbotError> {
//! let config = DeliveryConfig::new().with_addresses(["CE:2A:46:46:22:76"]);
//! let coordinator = DeliveryCoordinator::new(Arc::new(transport), config);
//!
//! let outcome = coordinator.deliver(Command::decode("on")?).await;
//! println!("{}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod intake;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{Command, Payload, SWITCHBOT_WRITE_CHARACTERISTIC_UUID};
pub use config::{
    parse_address_list, DeliveryConfig, ADDRESS_ENV_VAR, DEFAULT_DEVICE_ADDRESS,
    DEFAULT_MAX_CYCLES,
};
pub use delivery::{
    AttemptOutcome, DeliveryAttempt, DeliveryCoordinator, DeliveryOutcome, DeliveryReport,
    DeliveryState, NO_CANDIDATES_DIAGNOSTIC,
};
pub use errors::{
    ConnectError, ConnectResult, Result, SwitchbotError, TransportError, WriteError, WriteResult,
};
pub use intake::{CommandIntake, IntakeEvent, IntakeHandle, IntakeStats};
pub use transport::{BotTransport, DeviceAddress};
