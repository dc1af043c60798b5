//! Host Bluetooth LE radio through btleplug.
//!
//! btleplug reports discoveries as a stream of [`CentralEvent`]s. A delivery
//! task reads that stream, resolves each discovered or updated peripheral to
//! an [`Advertisement`] and hands it to the scan callback. `stop_scan` is
//! synchronous so it can run inside that callback; it cancels the task, which
//! then stops the radio scan itself.

use std::sync::{Arc, Mutex, MutexGuard};

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use cardbridge_core::{Advertisement, MacAddress};
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    HardwareError, Result,
    traits::{BleAdapter, ScanCallback},
};

struct Inner {
    adapter_index: usize,
    adapter: OnceCell<Adapter>,
    scan: Mutex<Option<CancellationToken>>,
}

impl Inner {
    fn scan(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.scan.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// BLE adapter backed by the host radio stack.
///
/// ```no_run
/// use cardbridge_hardware::ble::BtleplugAdapter;
/// use cardbridge_hardware::traits::BleAdapter;
///
/// # async fn example() -> cardbridge_hardware::Result<()> {
/// let adapter = BtleplugAdapter::new(0);
/// adapter.enable().await?;
/// adapter
///     .start_scan(Box::new(|adv| println!("{} {}", adv.address, adv.local_name)))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BtleplugAdapter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BtleplugAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugAdapter")
            .field("adapter_index", &self.inner.adapter_index)
            .field("enabled", &self.inner.adapter.initialized())
            .field("scanning", &self.is_scanning())
            .finish()
    }
}

impl BtleplugAdapter {
    /// Adapter for the `adapter_index`-th radio reported by the host.
    pub fn new(adapter_index: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                adapter_index,
                adapter: OnceCell::new(),
                scan: Mutex::new(None),
            }),
        }
    }

    /// Check if the delivery task is running.
    pub fn is_scanning(&self) -> bool {
        self.inner
            .scan()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    fn adapter(&self) -> Result<&Adapter> {
        self.inner
            .adapter
            .get()
            .ok_or_else(|| HardwareError::adapter_unavailable("adapter not enabled"))
    }

    /// Claim the scan slot, failing if a scan is already running.
    fn claim_scan(&self) -> Result<CancellationToken> {
        let mut scan = self.inner.scan();
        if scan.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return Err(HardwareError::busy("scan already running"));
        }
        let token = CancellationToken::new();
        *scan = Some(token.clone());
        Ok(token)
    }
}

impl BleAdapter for BtleplugAdapter {
    async fn enable(&self) -> Result<()> {
        let index = self.inner.adapter_index;
        let adapter = self
            .inner
            .adapter
            .get_or_try_init(|| async {
                let manager = Manager::new()
                    .await
                    .map_err(|e| HardwareError::adapter_unavailable(e.to_string()))?;
                let adapters = manager
                    .adapters()
                    .await
                    .map_err(|e| HardwareError::adapter_unavailable(e.to_string()))?;
                adapters.into_iter().nth(index).ok_or_else(|| {
                    HardwareError::adapter_unavailable(format!("no BLE adapter at index {index}"))
                })
            })
            .await?;

        match adapter.adapter_info().await {
            Ok(description) => info!(index, adapter = %description, "Bluetooth adapter enabled"),
            Err(e) => debug!(index, error = %e, "Adapter info unavailable"),
        }
        Ok(())
    }

    async fn start_scan(&self, on_advertisement: ScanCallback) -> Result<()> {
        let adapter = self.adapter()?.clone();
        let token = self.claim_scan()?;

        let started = async {
            let events = adapter.events().await?;
            adapter.start_scan(ScanFilter::default()).await?;
            Ok::<_, btleplug::Error>(events)
        };
        let events = match started.await {
            Ok(events) => events,
            Err(e) => {
                token.cancel();
                return Err(HardwareError::scan_failed(e.to_string()));
            }
        };

        debug!(index = self.inner.adapter_index, "BLE scan started");
        tokio::spawn(deliver_advertisements(adapter, events, token, on_advertisement));
        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        if let Some(token) = self.inner.scan().take() {
            token.cancel();
        }
        Ok(())
    }
}

async fn deliver_advertisements(
    adapter: Adapter,
    mut events: BoxStream<'static, CentralEvent>,
    token: CancellationToken,
    mut on_advertisement: ScanCallback,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = events.next() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };

        match read_advertisement(&adapter, &id).await {
            Ok(Some(adv)) if !token.is_cancelled() => on_advertisement(&adv),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Failed to read peripheral properties"),
        }
    }

    token.cancel();
    if let Err(e) = adapter.stop_scan().await {
        warn!(error = %e, "Failed to stop BLE scan");
    }
    debug!("BLE scan stopped");
}

async fn read_advertisement(
    adapter: &Adapter,
    id: &PeripheralId,
) -> btleplug::Result<Option<Advertisement>> {
    let peripheral = adapter.peripheral(id).await?;
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    Ok(Some(Advertisement::new(
        MacAddress::new(properties.address.into_inner()),
        properties.local_name.unwrap_or_default(),
        properties.rssi.unwrap_or_default(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_requires_enable() {
        let adapter = BtleplugAdapter::new(0);

        let result = adapter.start_scan(Box::new(|_| {})).await;
        assert!(matches!(result, Err(HardwareError::AdapterUnavailable { .. })));
        assert!(!adapter.is_scanning());
    }

    #[test]
    fn test_stop_without_scan_is_ok() {
        let adapter = BtleplugAdapter::new(0);
        adapter.stop_scan().unwrap();
        adapter.stop_scan().unwrap();
    }

    #[test]
    fn test_scan_slot_is_exclusive_until_stopped() {
        let adapter = BtleplugAdapter::new(0);

        let token = adapter.claim_scan().unwrap();
        assert!(adapter.is_scanning());
        assert!(matches!(adapter.claim_scan(), Err(HardwareError::Busy { .. })));

        adapter.stop_scan().unwrap();
        assert!(token.is_cancelled());
        assert!(adapter.claim_scan().is_ok());
    }
}
