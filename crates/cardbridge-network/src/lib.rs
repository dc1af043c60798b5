//! Network layer linking the card bridge to its relay broker.
//!
//! # Components
//!
//! - **BrokerUrl**: `tcp://host:port` endpoint parsing
//! - **RelayClient**: framed TCP connection carrying relay envelopes
//! - **serve**: receive loop dispatching requests onto the card session
//!
//! # Example
//!
//! ```no_run
//! use cardbridge_network::{BrokerUrl, RelayClient, RelayClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayClientConfig {
//!     broker: BrokerUrl::parse("tcp://127.0.0.1:1883")?,
//!     timeout: Duration::from_millis(3000),
//! };
//!
//! let client = RelayClient::connect(config).await?;
//! println!("connected as {}", client.relay_id());
//! # Ok(())
//! # }
//! ```

mod client;
mod serve;
mod url;

pub use client::{RelayClient, RelayClientConfig, RelayClientError};
pub use serve::{ServeStats, serve};
pub use url::BrokerUrl;
