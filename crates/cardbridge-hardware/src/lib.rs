//! Hardware abstraction layer for the ACR1555U card bridge.
//!
//! This crate defines the traits the bridge uses to reach its two hardware
//! collaborators:
//!
//! - [`BleAdapter`](traits::BleAdapter): the host's Bluetooth LE radio, used
//!   to scan for the reader's advertisements.
//! - [`CardReaderDriver`](traits::CardReaderDriver): the reader driver that
//!   opens the BLE link, selects a card slot and carries APDUs.
//!
//! # Design Philosophy
//!
//! - **Async-first**: I/O uses native `async fn` in traits.
//! - **Thread-safe**: adapters and drivers are `Send + Sync`.
//! - **Error-aware**: every operation returns [`Result<T>`] with a
//!   [`HardwareError`].
//!
//! ```no_run
//! use cardbridge_core::{CardProtocol, MacAddress};
//! use cardbridge_hardware::traits::{CardReader, CardReaderDriver, SmartCard};
//! use cardbridge_hardware::Result;
//!
//! async fn read_atr<D: CardReaderDriver>(driver: &D, address: MacAddress) -> Result<Vec<u8>> {
//!     let mut reader = driver.open(address).await?;
//!     let mut card = reader.connect(CardProtocol::Picc).await?;
//!     let atr = card.atr().await?;
//!     card.close().await?;
//!     reader.close().await?;
//!     Ok(atr)
//! }
//! ```
//!
//! # Backends
//!
//! - `ble` (feature `ble`): the host radio through btleplug.
//! - [`mock`]: an emulated radio and reader. The binary uses them when run
//!   with `--emulate` and the relay crate uses them in its tests.

#[cfg(feature = "ble")]
pub mod ble;
pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;

pub use error::{HardwareError, Result};
pub use traits::{BleAdapter, CardReader, CardReaderDriver, ScanCallback, SmartCard};
