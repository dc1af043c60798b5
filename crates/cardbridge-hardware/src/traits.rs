//! Hardware device trait definitions.
//!
//! This module defines the contract between the bridge core and the two
//! hardware collaborators it drives: the BLE radio adapter and the smart-card
//! reader driver that frames card commands over the BLE link.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro. For dynamic dispatch use
//! the enum wrappers in [`devices`](crate::devices).

#![allow(async_fn_in_trait)]

use cardbridge_core::{Advertisement, CardProtocol, MacAddress};

use crate::error::Result;

/// Callback invoked for every advertisement received while scanning.
///
/// The callback runs on the adapter's delivery context and must not block.
/// The advertisement is only borrowed for the duration of the call.
pub type ScanCallback = Box<dyn FnMut(&Advertisement) + Send + 'static>;

/// BLE radio adapter abstraction.
///
/// One adapter exists per process. At most one scan may be active on it at
/// a time; starting a second scan while one is running fails with
/// [`HardwareError::Busy`](crate::HardwareError::Busy).
///
/// # Examples
///
/// ```no_run
/// use cardbridge_hardware::traits::BleAdapter;
/// use cardbridge_hardware::Result;
///
/// async fn log_everything<A: BleAdapter>(adapter: &A) -> Result<()> {
///     adapter.enable().await?;
///     adapter
///         .start_scan(Box::new(|adv| println!("{} {}", adv.address, adv.local_name)))
///         .await
/// }
/// ```
pub trait BleAdapter: Send + Sync {
    /// Power up the radio and make the adapter ready for scanning.
    ///
    /// # Errors
    ///
    /// Returns an error if the radio stack is unavailable.
    async fn enable(&self) -> Result<()>;

    /// Start scanning, delivering each advertisement to `on_advertisement`.
    ///
    /// Returns once the scan is running; advertisements keep arriving on the
    /// callback until [`stop_scan`](Self::stop_scan) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The adapter is not enabled
    /// - A scan is already running
    /// - The radio refuses to start scanning
    async fn start_scan(&self, on_advertisement: ScanCallback) -> Result<()>;

    /// Stop the active scan.
    ///
    /// Safe to call from inside a scan callback and when no scan is running.
    fn stop_scan(&self) -> Result<()>;
}

/// Smart-card reader driver over the BLE link.
///
/// Opening a reader establishes the radio-level connection only; a card
/// session is started with [`CardReader::connect`].
pub trait CardReaderDriver: Send + Sync {
    /// Reader handle produced by [`open`](Self::open).
    type Reader: CardReader;

    /// Open a reader-level connection to the peripheral at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the peripheral cannot be reached or does not
    /// expose the reader service.
    async fn open(&self, address: MacAddress) -> Result<Self::Reader>;
}

/// An open reader connection.
pub trait CardReader: Send {
    /// Card handle produced by [`connect`](Self::connect).
    type Card: SmartCard;

    /// Select `protocol` and connect to the card in that slot.
    ///
    /// # Errors
    ///
    /// Returns an error if no card answers in the selected slot.
    async fn connect(&mut self, protocol: CardProtocol) -> Result<Self::Card>;

    /// Close the reader connection and release the radio link.
    async fn close(&mut self) -> Result<()>;
}

/// A connected card.
///
/// The card transport is half-duplex: callers must not issue overlapping
/// operations on one card.
pub trait SmartCard: Send + std::fmt::Debug {
    /// Fetch the card's Answer-To-Reset bytes.
    async fn atr(&mut self) -> Result<Vec<u8>>;

    /// Name of the reader device hosting this card.
    fn device_name(&self) -> String;

    /// Send a command APDU and return the response APDU.
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>>;

    /// Send a vendor control command to the reader.
    async fn control(&mut self, code: u16, data: &[u8]) -> Result<Vec<u8>>;

    /// End the card session.
    async fn close(&mut self) -> Result<()>;
}
