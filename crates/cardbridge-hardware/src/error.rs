//! Error types for hardware operations.
//!
//! This module defines error types for the BLE radio and the card reader
//! driver, covering disconnection, scan and connect failures, card errors,
//! unsupported backends, and busy resources.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation is not supported by the selected backend.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Resource already in use (a scan is running, a session is open).
    #[error("Device busy: {message}")]
    Busy { message: String },

    /// Radio adapter is unavailable or not enabled.
    #[error("Adapter unavailable: {message}")]
    AdapterUnavailable { message: String },

    /// Scan could not be started or stopped.
    #[error("Scan failed: {message}")]
    ScanFailed { message: String },

    /// Link-level connection to the peripheral failed.
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Card rejected the operation or is absent.
    #[error("Card error: {message}")]
    CardError { message: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new busy error.
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy {
            message: message.into(),
        }
    }

    /// Create a new adapter unavailable error.
    pub fn adapter_unavailable(message: impl Into<String>) -> Self {
        Self::AdapterUnavailable {
            message: message.into(),
        }
    }

    /// Create a new scan failure error.
    pub fn scan_failed(message: impl Into<String>) -> Self {
        Self::ScanFailed {
            message: message.into(),
        }
    }

    /// Create a new connection failure error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create a new card error.
    pub fn card(message: impl Into<String>) -> Self {
        Self::CardError {
            message: message.into(),
        }
    }
}
