//! Command codec for SwitchBot Bot actuators
//!
//! Maps the abstract `on`/`off` command tokens to the fixed byte payloads the
//! Bot firmware expects on its write characteristic.

use core::fmt;
use core::str::FromStr;

use uuid::Uuid;

use crate::errors::SwitchbotError;

// ----------------------------------------------------------------------------
// GATT Constants
// ----------------------------------------------------------------------------

/// SwitchBot Bot write characteristic UUID
pub const SWITCHBOT_WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xcba20002_224d_11e6_9fb8_0002a5d5c51b);

const TURN_ON_PAYLOAD: [u8; 3] = [0x57, 0x01, 0x01];
const TURN_OFF_PAYLOAD: [u8; 3] = [0x57, 0x01, 0x02];

// ----------------------------------------------------------------------------
// Command
// ----------------------------------------------------------------------------

/// A discrete actuator command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    On,
    Off,
}

impl Command {
    /// Decode a raw command token.
    ///
    /// Only the exact literals `"on"` and `"off"` are accepted. No trimming or
    /// case folding is applied.
    pub fn decode(token: &str) -> Result<Self, SwitchbotError> {
        match token {
            "on" => Ok(Command::On),
            "off" => Ok(Command::Off),
            _ => Err(SwitchbotError::UnrecognizedCommand {
                token: token.to_string(),
            }),
        }
    }

    /// Payload written to the Bot for this command
    pub const fn payload(self) -> Payload {
        match self {
            Command::On => Payload(TURN_ON_PAYLOAD),
            Command::Off => Payload(TURN_OFF_PAYLOAD),
        }
    }

    /// Canonical token for this command
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::On => "on",
            Command::Off => "off",
        }
    }
}

impl FromStr for Command {
    type Err = SwitchbotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Payload
// ----------------------------------------------------------------------------

/// Fixed-length byte sequence written to the Bot's characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Payload([u8; 3]);

impl Payload {
    /// Raw payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_tokens() {
        assert_eq!(Command::decode("on").unwrap(), Command::On);
        assert_eq!(Command::decode("off").unwrap(), Command::Off);
        assert_eq!("off".parse::<Command>().unwrap(), Command::Off);
    }

    #[test]
    fn test_decode_is_exact_match() {
        for token in ["ON", "On", " on", "on\n", "off ", "", "press", "toggle"] {
            match Command::decode(token) {
                Err(SwitchbotError::UnrecognizedCommand { token: t }) => assert_eq!(t, token),
                other => panic!("expected UnrecognizedCommand for {token:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_payload_table() {
        assert_eq!(Command::On.payload().as_bytes(), &[0x57, 0x01, 0x01]);
        assert_eq!(Command::Off.payload().as_bytes(), &[0x57, 0x01, 0x02]);
        assert_eq!(Command::Off.payload().to_string(), "570102");
    }

    #[test]
    fn test_characteristic_uuid() {
        assert_eq!(
            SWITCHBOT_WRITE_CHARACTERISTIC_UUID.to_string(),
            "cba20002-224d-11e6-9fb8-0002a5d5c51b"
        );
    }

    #[test]
    fn test_display_round_trips_token() {
        for command in [Command::On, Command::Off] {
            assert_eq!(Command::decode(&command.to_string()).unwrap(), command);
        }
    }
}
