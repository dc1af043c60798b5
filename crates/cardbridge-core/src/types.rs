use crate::{
    Result,
    constants::{DEFAULT_NAME_PREFIX, MAC_ADDRESS_LENGTH, OBSERVE_ALL},
    error::Error,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Six hex byte pairs separated by `:` or `-`.
static MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})$").expect("MAC pattern is valid")
});

/// Check whether a string has the shape of a MAC address.
///
/// A string of this shape can still fail [`MacAddress`] parsing, e.g. when
/// it mixes `:` and `-` separators.
pub fn is_mac_pattern(s: &str) -> bool {
    MAC_PATTERN.is_match(s)
}

/// Bluetooth device address (6 bytes, most significant first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress([u8; MAC_ADDRESS_LENGTH]);

impl MacAddress {
    /// Create an address from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; MAC_ADDRESS_LENGTH]) -> Self {
        MacAddress(bytes)
    }

    /// Get the raw address bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; MAC_ADDRESS_LENGTH] {
        &self.0
    }

    /// Copy the address bytes into a vector (wire representation).
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl std::str::FromStr for MacAddress {
    type Err = Error;

    /// Parse `AA:BB:CC:DD:EE:FF` or `aa-bb-cc-dd-ee-ff`.
    ///
    /// # Errors
    /// Returns `Error::InvalidMacAddress` if the string is not six hex pairs
    /// joined by a single separator kind.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMacAddress(s.to_string());

        let separator = if s.contains(':') { ':' } else { '-' };
        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != MAC_ADDRESS_LENGTH {
            return Err(invalid());
        }

        let mut bytes = [0u8; MAC_ADDRESS_LENGTH];
        for (byte, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        Ok(MacAddress(bytes))
    }
}

impl From<[u8; MAC_ADDRESS_LENGTH]> for MacAddress {
    fn from(bytes: [u8; MAC_ADDRESS_LENGTH]) -> Self {
        MacAddress(bytes)
    }
}

/// Target device selection for a scan.
///
/// Every specifier string falls into exactly one variant, checked in order:
/// MAC pattern, `*`, empty, anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpecifier {
    /// Match the advertisement whose address equals this MAC.
    Address(MacAddress),

    /// Log every advertisement, never match.
    ObserveAll,

    /// Match the first name starting with [`DEFAULT_NAME_PREFIX`].
    DefaultPrefix,

    /// Match the advertised name exactly.
    Name(String),
}

impl DeviceSpecifier {
    /// Classify a specifier string.
    ///
    /// # Errors
    /// Returns `Error::InvalidMacAddress` if the string looks like a MAC
    /// address but does not parse as one.
    pub fn parse(s: &str) -> Result<Self> {
        if is_mac_pattern(s) {
            return Ok(DeviceSpecifier::Address(s.parse()?));
        }

        Ok(match s {
            OBSERVE_ALL => DeviceSpecifier::ObserveAll,
            "" => DeviceSpecifier::DefaultPrefix,
            name => DeviceSpecifier::Name(name.to_string()),
        })
    }

    /// Whether a scan with this specifier can ever produce a match.
    #[must_use]
    pub fn can_match(&self) -> bool {
        !matches!(self, DeviceSpecifier::ObserveAll)
    }
}

impl fmt::Display for DeviceSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceSpecifier::Address(mac) => write!(f, "address {mac}"),
            DeviceSpecifier::ObserveAll => write!(f, "observe all"),
            DeviceSpecifier::DefaultPrefix => write!(f, "name prefix {DEFAULT_NAME_PREFIX}"),
            DeviceSpecifier::Name(name) => write!(f, "name {name}"),
        }
    }
}

impl std::str::FromStr for DeviceSpecifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceSpecifier::parse(s)
    }
}

/// A discovered BLE advertisement.
///
/// Radio stacks hand advertisements to scan callbacks by reference; anything
/// that must outlive the callback is cloned out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    /// Device address.
    pub address: MacAddress,

    /// Advertised local name (may be empty).
    pub local_name: String,

    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl Advertisement {
    pub fn new(address: MacAddress, local_name: impl Into<String>, rssi: i16) -> Self {
        Self {
            address,
            local_name: local_name.into(),
            rssi,
        }
    }
}

/// Logical card slot selected on the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardProtocol {
    /// Contactless (PICC) slot.
    Picc,
    /// SAM slot, T=1.
    Sam,
}

impl CardProtocol {
    /// Pick the slot from the secondary-protocol flag.
    #[must_use]
    pub fn select(use_secondary: bool) -> Self {
        if use_secondary {
            CardProtocol::Sam
        } else {
            CardProtocol::Picc
        }
    }
}

impl fmt::Display for CardProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CardProtocol::Picc => write!(f, "PICC"),
            CardProtocol::Sam => write!(f, "SAM (T=1)"),
        }
    }
}
