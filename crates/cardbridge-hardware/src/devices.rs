//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn BleAdapter>` is
//! not available. The binary selects a backend at startup and holds it
//! through these enums instead. The host radio variant is only compiled with
//! the `ble` feature.
//!
//! # Examples
//!
//! ```
//! use cardbridge_hardware::devices::AnyBleAdapter;
//! use cardbridge_hardware::mock::MockAdapter;
//!
//! let (adapter, _handle) = MockAdapter::new();
//! let any_adapter = AnyBleAdapter::Mock(adapter);
//!
//! // Can now be used polymorphically through the BleAdapter trait
//! ```

use cardbridge_core::{CardProtocol, MacAddress};

#[cfg(feature = "ble")]
use crate::ble::BtleplugAdapter;
use crate::mock::{MockAdapter, MockCard, MockCardReader, MockReaderDriver};
use crate::traits::{BleAdapter, CardReader, CardReaderDriver, ScanCallback, SmartCard};
use crate::{HardwareError, Result};

/// Enum wrapper for BLE adapter dispatch.
///
/// # Examples
///
/// ```
/// use cardbridge_hardware::devices::AnyBleAdapter;
/// use cardbridge_hardware::traits::BleAdapter;
/// use cardbridge_hardware::mock::MockAdapter;
///
/// #[tokio::main]
/// async fn main() -> cardbridge_hardware::Result<()> {
///     let (adapter, _handle) = MockAdapter::new();
///     let any_adapter = AnyBleAdapter::Mock(adapter);
///
///     any_adapter.enable().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyBleAdapter {
    /// Emulated radio for development and testing.
    Mock(MockAdapter),
    /// Host radio (BlueZ, CoreBluetooth or WinRT).
    #[cfg(feature = "ble")]
    Btleplug(BtleplugAdapter),
}

impl BleAdapter for AnyBleAdapter {
    async fn enable(&self) -> Result<()> {
        match self {
            Self::Mock(adapter) => adapter.enable().await,
            #[cfg(feature = "ble")]
            Self::Btleplug(adapter) => adapter.enable().await,
        }
    }

    async fn start_scan(&self, on_advertisement: ScanCallback) -> Result<()> {
        match self {
            Self::Mock(adapter) => adapter.start_scan(on_advertisement).await,
            #[cfg(feature = "ble")]
            Self::Btleplug(adapter) => adapter.start_scan(on_advertisement).await,
        }
    }

    fn stop_scan(&self) -> Result<()> {
        match self {
            Self::Mock(adapter) => adapter.stop_scan(),
            #[cfg(feature = "ble")]
            Self::Btleplug(adapter) => adapter.stop_scan(),
        }
    }
}

/// Enum wrapper for card reader driver dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyReaderDriver {
    /// Emulated ACR1555U for development and testing.
    Mock(MockReaderDriver),
    /// No card-framing driver exists for the radio in use; every open fails
    /// with [`HardwareError::Unsupported`].
    Unsupported,
}

impl CardReaderDriver for AnyReaderDriver {
    type Reader = AnyCardReader;

    async fn open(&self, address: MacAddress) -> Result<Self::Reader> {
        match self {
            Self::Mock(driver) => driver.open(address).await.map(AnyCardReader::Mock),
            Self::Unsupported => Err(HardwareError::unsupported(format!(
                "card framing over GATT for {address}"
            ))),
        }
    }
}

/// Enum wrapper for an open reader connection.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCardReader {
    Mock(MockCardReader),
}

impl CardReader for AnyCardReader {
    type Card = AnyCard;

    async fn connect(&mut self, protocol: CardProtocol) -> Result<Self::Card> {
        match self {
            Self::Mock(reader) => reader.connect(protocol).await.map(AnyCard::Mock),
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(reader) => reader.close().await,
        }
    }
}

/// Enum wrapper for a connected card.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCard {
    Mock(MockCard),
}

impl SmartCard for AnyCard {
    async fn atr(&mut self) -> Result<Vec<u8>> {
        match self {
            Self::Mock(card) => card.atr().await,
        }
    }

    fn device_name(&self) -> String {
        match self {
            Self::Mock(card) => card.device_name(),
        }
    }

    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Mock(card) => card.exchange(command).await,
        }
    }

    async fn control(&mut self, code: u16, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Mock(card) => card.control(code, data).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(card) => card.close().await,
        }
    }
}
