//! Error types for discovery, session setup and message dispatch.

use cardbridge_core::{CardProtocol, MacAddress};
use cardbridge_hardware::HardwareError;
use cardbridge_protocol::PayloadType;
use thiserror::Error;

/// Errors returned by a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specifier looked like a MAC address but did not parse.
    #[error("Invalid device specifier: {0}")]
    InvalidSpecifier(#[source] cardbridge_core::Error),

    /// The adapter refused to start scanning.
    #[error("Failed to start scan: {0}")]
    Start(#[source] HardwareError),

    /// Another scan is running on this scanner.
    #[error("Scan already in progress")]
    AlreadyScanning,

    /// The scope was cancelled before a device matched.
    #[error("Scan cancelled: {cause}")]
    Cancelled { cause: String },
}

/// Errors returned while establishing a card session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to connect to reader {address}: {source}")]
    ReaderConnect {
        address: MacAddress,
        #[source]
        source: HardwareError,
    },

    #[error("Failed to connect to card ({protocol}): {source}")]
    CardConnect {
        protocol: CardProtocol,
        #[source]
        source: HardwareError,
    },

    #[error("Failed to read ATR: {0}")]
    Atr(#[source] HardwareError),

    #[error("Session setup cancelled: {cause}")]
    Cancelled { cause: String },
}

/// Errors raised while handling a single relay message.
///
/// These never end the session; the message is reported as unhandled.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unsupported message: {0}")]
    UnsupportedMessage(&'static str),

    #[error("Unsupported payload type: {0:?}")]
    UnsupportedPayloadType(PayloadType),

    #[error("Invalid control payload: control code {control:?} is absent or exceeds 16 bits")]
    InvalidControlPayload { control: Option<u32> },

    #[error("Card exchange failed: {0}")]
    Exchange(#[source] HardwareError),

    #[error("Reader control {code:#06X} failed: {source}")]
    Control {
        code: u16,
        #[source]
        source: HardwareError,
    },

    #[error("Failed to send reply: {0}")]
    Reply(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Operation cancelled: {cause}")]
    Cancelled { cause: String },
}
