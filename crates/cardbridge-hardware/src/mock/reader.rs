//! Mock card reader implementation for testing and development.
//!
//! This module provides a simulated ACR1555U-style reader driver. Responses
//! can be scripted, every step can be made to fail, and every driver call is
//! recorded so tests can assert on cleanup ordering.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use cardbridge_core::{CardProtocol, MacAddress};
use tracing::debug;

use crate::{
    HardwareError, Result,
    traits::{CardReader, CardReaderDriver, SmartCard},
};

/// ATR of an ISO 14443-4 contactless card as reported through PC/SC.
pub const DEFAULT_ATR: [u8; 11] = [
    0x3B, 0x86, 0x80, 0x01, 0x80, 0x73, 0xC8, 0x21, 0x10, 0x00, 0x51,
];

/// Status word returned for exchanges when no response is scripted.
pub const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

/// Call recorded by the mock reader driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderCall {
    Open(MacAddress),
    Connect(CardProtocol),
    Atr,
    Exchange(Vec<u8>),
    Control(u16, Vec<u8>),
    CardClose,
    ReaderClose,
}

/// Step of the reader lifecycle that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Open,
    Connect,
    Atr,
    Exchange,
    Control,
    CardClose,
    ReaderClose,
}

#[derive(Debug)]
struct ReaderState {
    device_name: String,
    atr: Vec<u8>,
    responses: VecDeque<Vec<u8>>,
    failures: Vec<(FailurePoint, String)>,
    calls: Vec<ReaderCall>,
}

impl ReaderState {
    fn record(&mut self, call: ReaderCall) {
        self.calls.push(call);
    }

    fn check(&mut self, point: FailurePoint) -> std::result::Result<(), String> {
        match self.failures.iter().position(|(p, _)| *p == point) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ReaderState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ReaderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Mock card reader driver for testing and development.
///
/// # Examples
///
/// ```
/// use cardbridge_core::{CardProtocol, MacAddress};
/// use cardbridge_hardware::mock::MockReaderDriver;
/// use cardbridge_hardware::traits::{CardReader, CardReaderDriver, SmartCard};
///
/// #[tokio::main]
/// async fn main() -> cardbridge_hardware::Result<()> {
///     let (driver, handle) = MockReaderDriver::new();
///     handle.push_response(vec![0x6F, 0x00, 0x90, 0x00]);
///
///     let mut reader = driver.open(MacAddress::new([1, 2, 3, 4, 5, 6])).await?;
///     let mut card = reader.connect(CardProtocol::Picc).await?;
///
///     let response = card.exchange(&[0x00, 0xA4, 0x04, 0x00]).await?;
///     assert_eq!(response, vec![0x6F, 0x00, 0x90, 0x00]);
///
///     card.close().await?;
///     reader.close().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockReaderDriver {
    shared: Arc<Shared>,
}

impl MockReaderDriver {
    /// Create a new mock driver with the default device name and ATR.
    pub fn new() -> (Self, MockReaderHandle) {
        Self::with_name("ACR1555U Mock Reader")
    }

    /// Create a new mock driver with a custom device name.
    pub fn with_name(device_name: impl Into<String>) -> (Self, MockReaderHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(ReaderState {
                device_name: device_name.into(),
                atr: DEFAULT_ATR.to_vec(),
                responses: VecDeque::new(),
                failures: Vec::new(),
                calls: Vec::new(),
            }),
        });

        (
            Self {
                shared: shared.clone(),
            },
            MockReaderHandle { shared },
        )
    }
}

impl CardReaderDriver for MockReaderDriver {
    type Reader = MockCardReader;

    async fn open(&self, address: MacAddress) -> Result<Self::Reader> {
        let mut state = self.shared.state();
        state.record(ReaderCall::Open(address));
        state
            .check(FailurePoint::Open)
            .map_err(HardwareError::connection_failed)?;

        debug!(%address, "Mock reader opened");
        Ok(MockCardReader {
            shared: self.shared.clone(),
            open: true,
        })
    }
}

/// Open connection to a mock reader.
#[derive(Debug)]
pub struct MockCardReader {
    shared: Arc<Shared>,
    open: bool,
}

impl CardReader for MockCardReader {
    type Card = MockCard;

    async fn connect(&mut self, protocol: CardProtocol) -> Result<Self::Card> {
        if !self.open {
            return Err(HardwareError::disconnected("reader closed"));
        }

        let mut state = self.shared.state();
        state.record(ReaderCall::Connect(protocol));
        state.check(FailurePoint::Connect).map_err(HardwareError::card)?;

        Ok(MockCard {
            shared: self.shared.clone(),
            device_name: state.device_name.clone(),
            connected: true,
        })
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.shared.state();
        state.record(ReaderCall::ReaderClose);
        self.open = false;
        state
            .check(FailurePoint::ReaderClose)
            .map_err(HardwareError::communication)
    }
}

/// Card connected through a mock reader.
#[derive(Debug)]
pub struct MockCard {
    shared: Arc<Shared>,
    device_name: String,
    connected: bool,
}

impl MockCard {
    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(HardwareError::disconnected("card session closed"))
        }
    }
}

impl SmartCard for MockCard {
    async fn atr(&mut self) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let mut state = self.shared.state();
        state.record(ReaderCall::Atr);
        state.check(FailurePoint::Atr).map_err(HardwareError::card)?;
        Ok(state.atr.clone())
    }

    fn device_name(&self) -> String {
        self.device_name.clone()
    }

    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let mut state = self.shared.state();
        state.record(ReaderCall::Exchange(command.to_vec()));
        state.check(FailurePoint::Exchange).map_err(HardwareError::card)?;
        Ok(state
            .responses
            .pop_front()
            .unwrap_or_else(|| SW_SUCCESS.to_vec()))
    }

    async fn control(&mut self, code: u16, data: &[u8]) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let mut state = self.shared.state();
        state.record(ReaderCall::Control(code, data.to_vec()));
        state
            .check(FailurePoint::Control)
            .map_err(HardwareError::communication)?;
        Ok(state.responses.pop_front().unwrap_or_default())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.shared.state();
        state.record(ReaderCall::CardClose);
        self.connected = false;
        state.check(FailurePoint::CardClose).map_err(HardwareError::card)
    }
}

/// Handle for controlling a mock reader driver.
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    shared: Arc<Shared>,
}

impl MockReaderHandle {
    /// Set the ATR reported by cards.
    pub fn set_atr(&self, atr: Vec<u8>) {
        self.shared.state().atr = atr;
    }

    /// Queue a response for the next exchange or control call.
    pub fn push_response(&self, response: Vec<u8>) {
        self.shared.state().responses.push_back(response);
    }

    /// Make the next call at `point` fail with `message`.
    pub fn fail_at(&self, point: FailurePoint, message: impl Into<String>) {
        self.shared.state().failures.push((point, message.into()));
    }

    /// All calls recorded so far, in order.
    pub fn calls(&self) -> Vec<ReaderCall> {
        self.shared.state().calls.clone()
    }

    /// Get the device name reported by cards.
    pub fn device_name(&self) -> String {
        self.shared.state().device_name.clone()
    }
}
