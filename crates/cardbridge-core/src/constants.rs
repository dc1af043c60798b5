//! Core constants for the card bridge.
//!
//! This module collects the fixed values shared by the discovery, session
//! and relay layers: the advertised-name prefix used when no device is
//! specified, the observe-only specifier, control code limits, and the
//! process-level configuration keys and exit codes.
//!
//! # Usage
//!
//! ```
//! use cardbridge_core::constants::*;
//!
//! assert!("ACR1555U-J1 123".starts_with(DEFAULT_NAME_PREFIX));
//! assert_eq!(OBSERVE_ALL, "*");
//! assert_eq!(MAX_CONTROL_CODE, u32::from(u16::MAX));
//! ```

// ============================================================================
// Device Discovery
// ============================================================================

/// Advertised-name prefix matched when the device specifier is empty.
///
/// ACS ACR1555U readers advertise as `ACR1555U` followed by a model suffix
/// and serial number, so only the prefix is compared.
///
/// # Examples
///
/// ```
/// use cardbridge_core::constants::DEFAULT_NAME_PREFIX;
///
/// assert!("ACR1555U-J1 SN:0042".starts_with(DEFAULT_NAME_PREFIX));
/// assert!(!"ACR122U".starts_with(DEFAULT_NAME_PREFIX));
/// ```
pub const DEFAULT_NAME_PREFIX: &str = "ACR1555U";

/// Device specifier that puts the scanner in observe-only mode.
///
/// Every discovered advertisement is logged and nothing is ever matched,
/// so the scan runs until it is cancelled.
pub const OBSERVE_ALL: &str = "*";

/// Number of bytes in a Bluetooth device address.
pub const MAC_ADDRESS_LENGTH: usize = 6;

// ============================================================================
// Reader Control
// ============================================================================

/// Largest control code accepted for reader-control payloads.
///
/// Control codes travel as 32-bit integers on the wire but address a
/// 16-bit vendor command space.
pub const MAX_CONTROL_CODE: u32 = 0xFFFF;

// ============================================================================
// Relay Link
// ============================================================================

/// Environment variable consulted for the broker URL when no flag is given.
pub const BROKER_URL_ENV: &str = "BROKER_URL";

/// URL scheme accepted for the broker link.
pub const BROKER_URL_SCHEME: &str = "tcp";

/// Default timeout for establishing the broker connection (milliseconds).
///
/// # Value: 10000ms (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Process Exit Codes
// ============================================================================

/// Normal shutdown after a termination signal.
pub const EXIT_OK: u8 = 0;

/// Unrecoverable startup or operational error.
pub const EXIT_FAILURE: u8 = 1;

/// Required configuration missing; usage was printed.
pub const EXIT_USAGE: u8 = 2;
