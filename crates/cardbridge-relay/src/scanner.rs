//! Cancellable BLE scan returning the first matching advertisement.
//!
//! The adapter invokes the scan callback on its own delivery context. The
//! callback stops the scan on the first match and hands the advertisement to
//! the waiting caller through a capacity-one channel; later matches find the
//! slot full and are dropped, so a scan delivers at most one result.

use std::sync::atomic::{AtomicBool, Ordering};

use cardbridge_core::{Advertisement, CancelScope, DeviceSpecifier};
use cardbridge_hardware::{BleAdapter, ScanCallback};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::ScanError;
use crate::matcher::DeviceMatcher;

/// Scan until a device matches `specifier` or `scope` is cancelled.
///
/// # Errors
///
/// - [`ScanError::Start`] if the adapter refuses to scan
/// - [`ScanError::Cancelled`] carrying the scope's cause
pub async fn scan<A>(
    scope: &CancelScope,
    adapter: &A,
    specifier: &DeviceSpecifier,
) -> Result<Advertisement, ScanError>
where
    A: BleAdapter + Clone + 'static,
{
    let matcher = DeviceMatcher::new(specifier);
    if matcher.is_observe_only() {
        info!("Starting in scan only mode");
    }
    let (found_tx, mut found_rx) = mpsc::channel::<Advertisement>(1);
    let stopper = adapter.clone();

    let on_advertisement: ScanCallback = Box::new(move |adv: &Advertisement| {
        if matcher.is_observe_only() {
            info!(local_name = %adv.local_name, address = %adv.address, "Found device");
            return;
        }
        if !matcher.matches(adv) {
            return;
        }

        if let Err(e) = stopper.stop_scan() {
            debug!(error = %e, "Failed to stop scan after match");
        }
        // A full slot means an earlier match was already handed off.
        let _ = found_tx.try_send(adv.clone());
    });

    adapter
        .start_scan(on_advertisement)
        .await
        .map_err(ScanError::Start)?;
    debug!(%specifier, "Scanning");

    tokio::select! {
        biased;
        Some(found) = found_rx.recv() => {
            info!(
                local_name = %found.local_name,
                address = %found.address,
                rssi = found.rssi,
                "Found reader"
            );
            Ok(found)
        }
        _ = scope.cancelled() => {
            if let Err(e) = adapter.stop_scan() {
                debug!(error = %e, "Failed to stop scan on cancel");
            }
            Err(ScanError::Cancelled {
                cause: scope.cause().unwrap_or_default(),
            })
        }
    }
}

/// Owns the process adapter and allows one scan at a time.
#[derive(Debug)]
pub struct Scanner<A> {
    adapter: A,
    in_flight: AtomicBool,
}

impl<A> Scanner<A>
where
    A: BleAdapter + Clone + 'static,
{
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Parse `specifier` and scan for it.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidSpecifier`] without starting a scan when
    /// the specifier looks like a MAC address but does not parse.
    pub async fn scan(&self, scope: &CancelScope, specifier: &str) -> Result<Advertisement, ScanError> {
        let specifier = DeviceSpecifier::parse(specifier).map_err(ScanError::InvalidSpecifier)?;
        self.scan_for(scope, &specifier).await
    }

    /// Scan for an already parsed specifier.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::AlreadyScanning`] if a scan is in flight.
    pub async fn scan_for(
        &self,
        scope: &CancelScope,
        specifier: &DeviceSpecifier,
    ) -> Result<Advertisement, ScanError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(ScanError::AlreadyScanning);
        }
        let _in_flight = InFlight(&self.in_flight);

        scan(scope, &self.adapter, specifier).await
    }

    pub fn is_scanning(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Clears the in-flight flag when the scan future completes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
