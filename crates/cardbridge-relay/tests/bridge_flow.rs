//! End-to-end flow over emulated hardware: scan, connect, serve, close.

use std::sync::Mutex;

use cardbridge_core::{Advertisement, CancelScope, CardProtocol, MacAddress};
use cardbridge_hardware::BleAdapter;
use cardbridge_hardware::mock::{AdapterCall, MockAdapter, MockReaderDriver, ReaderCall};
use cardbridge_protocol::{EnvelopeMeta, Message, Payload, RelayInfo};
use cardbridge_relay::{
    BridgeState, RelayDispatcher, ReplySink, Scanner, SessionError, StateMachine, connect_card,
};

const READER: MacAddress = MacAddress::new([0xD4, 0x3A, 0x2C, 0x01, 0x02, 0x03]);

#[derive(Default)]
struct Replies(Mutex<Vec<Message>>);

impl ReplySink for Replies {
    type Error = std::io::Error;

    async fn send_reply(&self, _request: &EnvelopeMeta, message: Message) -> std::io::Result<()> {
        self.0.lock().unwrap().push(message);
        Ok(())
    }
}

#[tokio::test]
async fn test_scan_connect_serve_close() {
    let found = Advertisement::new(READER, "ACR1555U-J1-000187", -61);
    let (adapter, radio) = MockAdapter::with_peripherals(vec![
        Advertisement::new(MacAddress::new([0x10; 6]), "", -90),
        found.clone(),
    ]);
    let (driver, reader) = MockReaderDriver::new();
    let scope = CancelScope::new();
    let mut machine = StateMachine::new();

    adapter.enable().await.unwrap();
    let scanner = Scanner::new(adapter);

    machine.transition_to(BridgeState::Scanning).unwrap();
    let matched = scanner.scan(&scope, "d4-3a-2c-01-02-03").await.unwrap();
    assert_eq!(matched, found);
    assert_eq!(radio.stop_count(), 1);
    assert_eq!(radio.calls().last(), Some(&AdapterCall::StopScan));

    machine.transition_to(BridgeState::Connecting).unwrap();
    let session = connect_card(&scope, &driver, matched.address, CardProtocol::select(false))
        .await
        .unwrap();
    let info = RelayInfo::for_reader(session.atr().to_vec(), session.device_name(), &matched);
    let dispatcher = RelayDispatcher::new(session, info.clone());

    machine.transition_to(BridgeState::Ready).unwrap();
    assert!(machine.is_serving());

    let sink = Replies::default();
    let meta = EnvelopeMeta::new("peer-1");
    assert!(
        dispatcher
            .handle_message(&scope, &sink, &meta, &Message::RequestRelayInfo)
            .await
    );
    assert!(
        dispatcher
            .handle_message(
                &scope,
                &sink,
                &meta,
                &Message::Payload(Payload::exchange(vec![0x00, 0xCA, 0x00, 0x00]))
            )
            .await
    );

    machine.transition_to(BridgeState::Closing).unwrap();
    dispatcher.into_session().close().await;
    machine.transition_to(BridgeState::Terminated).unwrap();

    let replies = sink.0.lock().unwrap().clone();
    assert_eq!(replies[0], Message::RelayInfo(info));
    assert_eq!(
        reader.calls(),
        vec![
            ReaderCall::Open(READER),
            ReaderCall::Connect(CardProtocol::Picc),
            ReaderCall::Atr,
            ReaderCall::Exchange(vec![0x00, 0xCA, 0x00, 0x00]),
            ReaderCall::CardClose,
            ReaderCall::ReaderClose,
        ]
    );
}

#[tokio::test]
async fn test_setup_failure_drives_closing() {
    let (driver, reader) = MockReaderDriver::new();
    reader.fail_at(cardbridge_hardware::mock::FailurePoint::Connect, "no card");
    let mut machine = StateMachine::new();
    machine.transition_to(BridgeState::Scanning).unwrap();
    machine.transition_to(BridgeState::Connecting).unwrap();

    let result = connect_card(&CancelScope::new(), &driver, READER, CardProtocol::Sam).await;
    assert!(matches!(result, Err(SessionError::CardConnect { .. })));
    assert_eq!(reader.calls().last(), Some(&ReaderCall::ReaderClose));

    assert_eq!(
        machine.begin_shutdown().map(|t| t.to),
        Some(BridgeState::Closing)
    );
}
