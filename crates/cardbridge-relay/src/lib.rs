//! Discovery, session and dispatch core of the ACR1555U card bridge.
//!
//! - [`scanner`]: cancellable BLE scan returning the first matching reader
//! - [`session`]: card session setup with leak-free partial-failure cleanup
//! - [`dispatcher`]: maps relay messages onto card operations
//! - [`state_machine`]: process lifecycle tracking
//!
//! # Examples
//!
//! ```
//! use cardbridge_core::{CancelScope, CardProtocol, DeviceSpecifier};
//! use cardbridge_hardware::BleAdapter;
//! use cardbridge_hardware::mock::{MockAdapter, MockReaderDriver};
//! use cardbridge_protocol::RelayInfo;
//! use cardbridge_relay::{RelayDispatcher, connect_card, scan};
//!
//! # use cardbridge_core::{Advertisement, MacAddress};
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     # let found = Advertisement::new(MacAddress::new([1, 2, 3, 4, 5, 6]), "ACR1555U-J1", -60);
//!     let (adapter, _radio) = MockAdapter::with_peripherals(vec![found]);
//!     let (driver, _reader) = MockReaderDriver::new();
//!     let scope = CancelScope::new();
//!
//!     adapter.enable().await?;
//!     let found = scan(&scope, &adapter, &DeviceSpecifier::DefaultPrefix).await?;
//!     let session = connect_card(&scope, &driver, found.address, CardProtocol::Picc).await?;
//!
//!     let info = RelayInfo::for_reader(session.atr().to_vec(), session.device_name(), &found);
//!     let dispatcher = RelayDispatcher::new(session, info);
//!
//!     dispatcher.into_session().close().await;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod matcher;
pub mod scanner;
pub mod session;
pub mod state_machine;

pub use dispatcher::{RelayDispatcher, ReplySink};
pub use error::{DispatchError, ScanError, SessionError};
pub use matcher::DeviceMatcher;
pub use scanner::{Scanner, scan};
pub use session::{CardSession, connect_card};
pub use state_machine::{BridgeState, MAX_HISTORY_SIZE, StateMachine, StateTransition};
