//! Startup sequencing and orderly teardown.
//!
//! ```text
//! enable adapter → scan → connect card → connect relay → serve
//!                                               ↓ (cancel)
//!                         close card session ← close relay
//! ```

use anyhow::Context;
use cardbridge_core::{Advertisement, CancelScope, CardProtocol};
use cardbridge_hardware::BleAdapter;
use cardbridge_hardware::devices::{AnyBleAdapter, AnyReaderDriver};
use cardbridge_hardware::mock::{MockAdapter, MockReaderDriver};
#[cfg(feature = "ble")]
use cardbridge_hardware::ble::BtleplugAdapter;
use cardbridge_network::{BrokerUrl, RelayClient, RelayClientConfig, serve};
use cardbridge_protocol::RelayInfo;
use cardbridge_relay::{
    BridgeState, RelayDispatcher, ScanError, Scanner, SessionError, StateMachine, connect_card,
};
use tracing::{error, info, warn};

use crate::config::{Backend, Emulation};

/// Everything the bridge needs after configuration has been resolved.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub specifier: String,
    pub use_sam: bool,
    pub broker: BrokerUrl,
    pub relay: RelayClientConfig,
    pub backend: Backend,
}

impl BridgeConfig {
    pub fn new(specifier: String, use_sam: bool, broker: BrokerUrl, backend: Backend) -> Self {
        Self {
            specifier,
            use_sam,
            relay: RelayClientConfig::new(broker.clone()),
            broker,
            backend,
        }
    }
}

fn emulated(emulation: &Emulation) -> (AnyBleAdapter, AnyReaderDriver) {
    let peripheral = Advertisement::new(emulation.address, emulation.name.clone(), emulation.rssi);
    let (adapter, _radio) = MockAdapter::with_peripherals(vec![peripheral]);
    let (driver, _reader) = MockReaderDriver::new();
    (AnyBleAdapter::Mock(adapter), AnyReaderDriver::Mock(driver))
}

/// Build the hardware backend.
///
/// The host radio can scan, but no card-framing driver exists for it yet, so
/// opening the matched reader fails as unsupported.
fn backend(backend: &Backend) -> anyhow::Result<(AnyBleAdapter, AnyReaderDriver)> {
    match backend {
        Backend::Emulated(emulation) => Ok(emulated(emulation)),
        #[cfg(feature = "ble")]
        Backend::Host { adapter_index } => Ok((
            AnyBleAdapter::Btleplug(BtleplugAdapter::new(*adapter_index)),
            AnyReaderDriver::Unsupported,
        )),
        #[cfg(not(feature = "ble"))]
        Backend::Host { .. } => {
            anyhow::bail!("Built without Bluetooth support, rebuild with `--features ble` or pass --emulate")
        }
    }
}

/// Run the bridge until `scope` is cancelled.
///
/// Cancellation at any stage is a normal shutdown. Everything else that
/// stops the bridge is returned as an error.
pub async fn run(config: &BridgeConfig, scope: &CancelScope) -> anyhow::Result<()> {
    let mut machine = StateMachine::new();
    let result = run_stages(config, scope, &mut machine).await;

    machine.begin_shutdown();
    if *machine.current_state() == BridgeState::Closing {
        machine.transition_to(BridgeState::Terminated)?;
    }
    result
}

async fn run_stages(
    config: &BridgeConfig,
    scope: &CancelScope,
    machine: &mut StateMachine,
) -> anyhow::Result<()> {
    let (adapter, driver) = backend(&config.backend)?;
    adapter
        .enable()
        .await
        .context("Error connecting to bluetooth adapter")?;

    if let Backend::Emulated(emulation) = &config.backend
        && config.specifier.is_empty()
        && !emulation.has_default_name()
    {
        warn!(name = %emulation.name, "Emulated reader name does not match the default scan");
    }

    machine.transition_to(BridgeState::Scanning)?;
    let scanner = Scanner::new(adapter);
    let found = match scanner.scan(scope, &config.specifier).await {
        Ok(found) => found,
        Err(ScanError::Cancelled { cause }) => {
            info!(%cause, "Stopped before a reader was found");
            return Ok(());
        }
        Err(e) => return Err(e).context("Error scanning"),
    };

    machine.transition_to(BridgeState::Connecting)?;
    let protocol = CardProtocol::select(config.use_sam);
    let session = match connect_card(scope, &driver, found.address, protocol).await {
        Ok(session) => session,
        Err(SessionError::Cancelled { cause }) => {
            info!(%cause, "Stopped while connecting to the card");
            return Ok(());
        }
        Err(e) => return Err(e).context("Error connecting to PC/SC card"),
    };

    let info = RelayInfo::for_reader(session.atr().to_vec(), session.device_name(), &found);
    let dispatcher = RelayDispatcher::new(session, info);

    let mut client = match scope.run(RelayClient::connect(config.relay.clone())).await {
        Ok(Ok(client)) => client,
        Ok(Err(e)) => {
            dispatcher.into_session().close().await;
            return Err(e).with_context(|| format!("Error connecting to relay broker {}", config.broker));
        }
        Err(cause) => {
            info!(%cause, "Stopped while connecting to the relay broker");
            dispatcher.into_session().close().await;
            return Ok(());
        }
    };
    info!(
        relay_id = %client.relay_id(),
        "Connected, share the relay_id with the remote peer"
    );

    machine.transition_to(BridgeState::Ready)?;
    let served = serve(&mut client, &dispatcher, scope).await;

    machine.transition_to(BridgeState::Closing)?;
    if let Err(e) = client.close().await {
        error!(error = %e, "Error closing relay");
    }
    dispatcher.into_session().close().await;

    let stats = served.context("Relay connection failed")?;
    info!(handled = stats.handled, unhandled = stats.unhandled, "Bridge stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbridge_core::MacAddress;
    use cardbridge_protocol::{Envelope, EnvelopeMeta, Message, RelayCodec};
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    fn emulation(name: &str) -> Backend {
        Backend::Emulated(Emulation {
            name: name.to_string(),
            address: MacAddress::new([0xD4, 0x3A, 0x2C, 0x00, 0x15, 0x55]),
            rssi: -50,
        })
    }

    async fn local_broker() -> (TcpListener, BrokerUrl) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, BrokerUrl::parse(&format!("tcp://127.0.0.1:{port}")).unwrap())
    }

    #[tokio::test]
    async fn test_serves_relay_info_then_shuts_down_on_cancel() {
        let (listener, broker) = local_broker().await;
        let config = BridgeConfig::new(String::new(), false, broker, emulation("ACR1555U-J1"));
        let scope = CancelScope::new();

        let peer = async {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, RelayCodec::new());
            framed
                .send(Envelope::new(EnvelopeMeta::new("peer"), Message::RequestRelayInfo))
                .await
                .unwrap();
            let reply = framed.next().await.unwrap().unwrap();
            scope.cancel_with_cause("received SIGTERM");
            reply
        };

        let (result, reply) = tokio::join!(run(&config, &scope), peer);
        result.unwrap();

        match reply.message {
            Message::RelayInfo(info) => {
                assert_eq!(info.device_address, vec![0xD4, 0x3A, 0x2C, 0x00, 0x15, 0x55]);
                assert_eq!(info.rssi, -50);
                assert!(!info.atr.is_empty());
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_during_scan_is_clean() {
        let (_listener, broker) = local_broker().await;
        let config = BridgeConfig::new("*".into(), false, broker, emulation("ACR1555U-J1"));
        let scope = CancelScope::new();
        scope.cancel_with_cause("received SIGINT");

        run(&config, &scope).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_mac_specifier_fails() {
        let (_listener, broker) = local_broker().await;
        let config = BridgeConfig::new("D4:3A-2C:00:15:55".into(), false, broker, emulation("ACR1555U-J1"));

        let err = run(&config, &CancelScope::new()).await.unwrap_err();
        assert!(err.to_string().contains("Error scanning"));
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails() {
        let (listener, broker) = local_broker().await;
        drop(listener);
        let config = BridgeConfig::new(String::new(), true, broker, emulation("ACR1555U-J1"));

        let err = run(&config, &CancelScope::new()).await.unwrap_err();
        assert!(err.to_string().contains("Error connecting to relay broker"));
    }

    #[cfg(not(feature = "ble"))]
    #[tokio::test]
    async fn test_host_radio_needs_ble_feature() {
        let (_listener, broker) = local_broker().await;
        let config = BridgeConfig::new(String::new(), false, broker, Backend::Host { adapter_index: 0 });

        let err = run(&config, &CancelScope::new()).await.unwrap_err();
        assert!(err.to_string().contains("--emulate"));
    }
}
