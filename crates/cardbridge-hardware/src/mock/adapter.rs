//! Mock BLE adapter implementation for testing and development.
//!
//! This module provides a simulated radio adapter whose advertisements are
//! injected programmatically. Every adapter call is recorded so tests can
//! assert on ordering (e.g. that the scan was stopped after the first match).

use std::sync::{Arc, Mutex, MutexGuard};

use cardbridge_core::{Advertisement, MacAddress};
use tokio::sync::Notify;
use tracing::debug;

use crate::{
    HardwareError, Result,
    traits::{BleAdapter, ScanCallback},
};

/// Call recorded by the mock adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Enable,
    StartScan,
    StopScan,
    /// An advertisement was handed to the scan callback.
    Delivered(MacAddress),
}

#[derive(Debug, Default)]
struct AdapterState {
    enabled: bool,
    scanning: bool,
    enable_failure: Option<String>,
    scan_failure: Option<String>,
    stop_failure: Option<String>,
    /// Replayed to the callback every time a scan starts.
    peripherals: Vec<Advertisement>,
    calls: Vec<AdapterCall>,
}

struct Shared {
    state: Mutex<AdapterState>,
    callback: Mutex<Option<ScanCallback>>,
    scan_started: Notify,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, AdapterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand `adv` to the registered callback.
    ///
    /// The state lock is released before the callback runs so the callback
    /// can call back into the adapter (e.g. `stop_scan`).
    fn deliver(&self, adv: &Advertisement, even_if_stopped: bool) -> bool {
        {
            let mut state = self.state();
            if !state.scanning && !even_if_stopped {
                return false;
            }
            state.calls.push(AdapterCall::Delivered(adv.address));
        }

        let mut callback = self.callback.lock().unwrap_or_else(|e| e.into_inner());
        match callback.as_mut() {
            Some(on_advertisement) => {
                on_advertisement(adv);
                true
            }
            None => false,
        }
    }
}

/// Mock BLE adapter for testing and development.
///
/// # Examples
///
/// ```
/// use cardbridge_core::{Advertisement, MacAddress};
/// use cardbridge_hardware::mock::MockAdapter;
/// use cardbridge_hardware::traits::BleAdapter;
///
/// #[tokio::main]
/// async fn main() -> cardbridge_hardware::Result<()> {
///     let (adapter, handle) = MockAdapter::new();
///     adapter.enable().await?;
///
///     adapter.start_scan(Box::new(|adv| println!("found {}", adv.local_name))).await?;
///
///     let adv = Advertisement::new(MacAddress::new([1, 2, 3, 4, 5, 6]), "ACR1555U-J1", -60);
///     assert!(handle.advertise(&adv));
///
///     adapter.stop_scan()?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MockAdapter {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state();
        f.debug_struct("MockAdapter")
            .field("enabled", &state.enabled)
            .field("scanning", &state.scanning)
            .finish()
    }
}

impl MockAdapter {
    /// Create a new mock adapter and its control handle.
    pub fn new() -> (Self, MockAdapterHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(AdapterState::default()),
            callback: Mutex::new(None),
            scan_started: Notify::new(),
        });

        (
            Self {
                shared: shared.clone(),
            },
            MockAdapterHandle { shared },
        )
    }

    /// Create a mock adapter that replays `peripherals` whenever a scan starts.
    pub fn with_peripherals(peripherals: Vec<Advertisement>) -> (Self, MockAdapterHandle) {
        let (adapter, handle) = Self::new();
        adapter.shared.state().peripherals = peripherals;
        (adapter, handle)
    }
}

impl BleAdapter for MockAdapter {
    async fn enable(&self) -> Result<()> {
        let mut state = self.shared.state();
        state.calls.push(AdapterCall::Enable);

        if let Some(message) = state.enable_failure.take() {
            return Err(HardwareError::adapter_unavailable(message));
        }

        state.enabled = true;
        Ok(())
    }

    async fn start_scan(&self, on_advertisement: ScanCallback) -> Result<()> {
        let peripherals = {
            let mut state = self.shared.state();

            if !state.enabled {
                return Err(HardwareError::adapter_unavailable("adapter not enabled"));
            }
            if state.scanning {
                return Err(HardwareError::busy("scan already running"));
            }
            if let Some(message) = state.scan_failure.take() {
                return Err(HardwareError::scan_failed(message));
            }

            state.scanning = true;
            state.calls.push(AdapterCall::StartScan);
            state.peripherals.clone()
        };

        *self.shared.callback.lock().unwrap_or_else(|e| e.into_inner()) = Some(on_advertisement);
        self.shared.scan_started.notify_waiters();
        debug!(peripherals = peripherals.len(), "Mock scan started");

        for adv in &peripherals {
            self.shared.deliver(adv, false);
        }

        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        let mut state = self.shared.state();
        state.calls.push(AdapterCall::StopScan);
        state.scanning = false;

        if let Some(message) = state.stop_failure.take() {
            return Err(HardwareError::scan_failed(message));
        }
        Ok(())
    }
}

/// Handle for controlling a mock adapter.
///
/// Shares state with the adapter it was created with.
#[derive(Clone)]
pub struct MockAdapterHandle {
    shared: Arc<Shared>,
}

impl MockAdapterHandle {
    /// Deliver an advertisement to the active scan.
    ///
    /// Returns `false` (and delivers nothing) when no scan is running.
    pub fn advertise(&self, adv: &Advertisement) -> bool {
        self.shared.deliver(adv, false)
    }

    /// Deliver an advertisement even if the scan has been stopped.
    ///
    /// Simulates a callback already in flight on the radio's delivery
    /// context when the scan was stopped.
    pub fn deliver_in_flight(&self, adv: &Advertisement) -> bool {
        self.shared.deliver(adv, true)
    }

    /// Add a peripheral replayed at the start of every scan.
    pub fn add_peripheral(&self, adv: Advertisement) {
        self.shared.state().peripherals.push(adv);
    }

    /// Make the next `enable` call fail.
    pub fn fail_enable(&self, message: impl Into<String>) {
        self.shared.state().enable_failure = Some(message.into());
    }

    /// Make the next `start_scan` call fail.
    pub fn fail_next_scan(&self, message: impl Into<String>) {
        self.shared.state().scan_failure = Some(message.into());
    }

    /// Make the next `stop_scan` call fail (the scan still stops).
    pub fn fail_next_stop(&self, message: impl Into<String>) {
        self.shared.state().stop_failure = Some(message.into());
    }

    /// Check if a scan is currently running.
    pub fn is_scanning(&self) -> bool {
        self.shared.state().scanning
    }

    /// Wait until a scan is running.
    pub async fn wait_until_scanning(&self) {
        loop {
            let notified = self.shared.scan_started.notified();
            if self.is_scanning() {
                return;
            }
            notified.await;
        }
    }

    /// All calls recorded so far, in order.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.shared.state().calls.clone()
    }

    /// Number of `stop_scan` calls recorded.
    pub fn stop_count(&self) -> usize {
        self.shared
            .state()
            .calls
            .iter()
            .filter(|call| **call == AdapterCall::StopScan)
            .count()
    }
}
