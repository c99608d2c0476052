//! SwitchBot BLE protocol constants and address matching

use switchbot_core::DeviceAddress;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// BLE Service UUIDs
// ----------------------------------------------------------------------------

/// Primary service advertised by SwitchBot Bots
pub const SWITCHBOT_SERVICE_UUID: Uuid = Uuid::from_u128(0xcba20d00_224d_11e6_9fb8_0002a5d5c51b);

pub use switchbot_core::SWITCHBOT_WRITE_CHARACTERISTIC_UUID;

// ----------------------------------------------------------------------------
// Address Matching
// ----------------------------------------------------------------------------

/// Whether a peripheral answers to a configured address.
///
/// Compared case-insensitively against both the hardware address and the
/// platform peripheral id, since some platforms (macOS) hide the former.
pub fn address_matches(configured: &DeviceAddress, hardware_address: &str, peripheral_id: &str) -> bool {
    let wanted = configured.as_str().trim();
    wanted.eq_ignore_ascii_case(hardware_address) || wanted.eq_ignore_ascii_case(peripheral_id)
}
