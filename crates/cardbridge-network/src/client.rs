//! TCP client linking the bridge to its relay broker.
//!
//! The client owns one connection for the life of the process. Envelopes are
//! framed by [`RelayCodec`]. The read and write halves are split so the
//! receive loop can hold the reader while replies go out through the shared
//! writer.
//!
//! # Architecture
//!
//! ```text
//! serve loop ──> RelayDispatcher ──> CardSession
//!     │                 │
//!     │                 └─> ReplySink (RelayClient::send_reply)
//!     │
//!     └─> RelayClient ───(TCP)───> Broker
//!              │
//!              └─> RelayCodec (length prefix + JSON)
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use cardbridge_network::{BrokerUrl, RelayClient, RelayClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayClientConfig::new(BrokerUrl::parse("tcp://127.0.0.1:1883")?);
//! let mut client = RelayClient::connect(config).await?;
//! println!("relay id {}", client.relay_id());
//!
//! let request = client.recv().await?;
//! println!("Received: {:?}", request.message);
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use cardbridge_core::constants::DEFAULT_CONNECT_TIMEOUT_MS;
use cardbridge_protocol::{CodecError, Envelope, EnvelopeMeta, Message, RelayCodec};
use cardbridge_relay::ReplySink;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::url::BrokerUrl;

/// Time allowed for flushing and shutting down the write half on close.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for the relay client.
#[derive(Debug, Clone)]
pub struct RelayClientConfig {
    /// Broker endpoint.
    pub broker: BrokerUrl,

    /// Timeout for connecting and for each send.
    pub timeout: Duration,
}

impl RelayClientConfig {
    /// Configuration with the default timeout.
    pub fn new(broker: BrokerUrl) -> Self {
        Self {
            broker,
            timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

/// Errors that can occur on the broker link.
#[derive(Debug, Error)]
pub enum RelayClientError {
    /// Connection attempt timed out.
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Write did not complete in time.
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// The connection was closed, by the broker or by `close`.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Frame could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connected relay client.
///
/// # Example
///
/// ```no_run
/// use cardbridge_network::{BrokerUrl, RelayClient, RelayClientConfig};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RelayClientConfig {
///     broker: "tcp://127.0.0.1:1883".parse()?,
///     timeout: Duration::from_millis(3000),
/// };
///
/// let mut client = RelayClient::connect(config).await?;
/// assert!(client.is_connected());
///
/// client.close().await?;
/// assert!(!client.is_connected());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RelayClient {
    broker: BrokerUrl,
    relay_id: String,
    reader: FramedRead<OwnedReadHalf, RelayCodec>,
    writer: Mutex<Option<FramedWrite<OwnedWriteHalf, RelayCodec>>>,
    timeout: Duration,
}

impl RelayClient {
    /// Connect to the broker.
    ///
    /// A fresh relay id is issued for every connection.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Connection times out
    /// - Broker refuses connection
    /// - Host cannot be resolved
    pub async fn connect(config: RelayClientConfig) -> Result<Self, RelayClientError> {
        let authority = config.broker.authority();
        info!(broker = %config.broker, "Connecting to relay broker");

        let stream = match tokio::time::timeout(config.timeout, TcpStream::connect(&authority)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!(broker = %config.broker, error = %e, "Connection failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!("Connection timeout after {}ms", config.timeout.as_millis());
                return Err(RelayClientError::ConnectionTimeout(
                    config.timeout.as_millis() as u64,
                ));
            }
        };

        // APDU round trips are small and latency bound.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {} - latency may be impacted", e);
        }

        let (read_half, write_half) = stream.into_split();
        let relay_id = Uuid::new_v4().simple().to_string();
        debug!(%relay_id, "Relay connected");

        Ok(Self {
            broker: config.broker,
            relay_id,
            reader: FramedRead::new(read_half, RelayCodec::new()),
            writer: Mutex::new(Some(FramedWrite::new(write_half, RelayCodec::new()))),
            timeout: config.timeout,
        })
    }

    /// Identifier stamped on every envelope this relay sends.
    pub fn relay_id(&self) -> &str {
        &self.relay_id
    }

    pub fn broker(&self) -> &BrokerUrl {
        &self.broker
    }

    /// Wait for the next envelope from the broker.
    ///
    /// There is no timeout; requests arrive whenever the peer sends them.
    /// Cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` when the broker closes the connection and
    /// `Codec` for a malformed frame. The stream is unusable after either.
    pub async fn recv(&mut self) -> Result<Envelope, RelayClientError> {
        match self.reader.next().await {
            Some(Ok(envelope)) => {
                trace!(
                    correlation_id = %envelope.meta.correlation_id,
                    kind = envelope.message.kind(),
                    "Received envelope"
                );
                Ok(envelope)
            }
            Some(Err(e)) => {
                error!(error = %e, "Failed to decode envelope");
                Err(e.into())
            }
            None => {
                warn!("Connection closed by broker");
                Err(RelayClientError::ConnectionLost(
                    "Broker closed connection".to_string(),
                ))
            }
        }
    }

    /// Send an envelope to the broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was closed, the write times out or
    /// the envelope cannot be encoded.
    pub async fn send(&self, envelope: Envelope) -> Result<(), RelayClientError> {
        trace!(
            correlation_id = %envelope.meta.correlation_id,
            kind = envelope.message.kind(),
            "Sending envelope"
        );

        let mut writer = self.writer.lock().await;
        let framed = writer
            .as_mut()
            .ok_or_else(|| RelayClientError::ConnectionLost("Client closed".to_string()))?;

        match tokio::time::timeout(self.timeout, framed.send(envelope)).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                warn!("Send timeout after {}ms", self.timeout.as_millis());
                Err(RelayClientError::WriteTimeout(self.timeout.as_millis() as u64))
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.writer
            .try_lock()
            .map(|writer| writer.is_some())
            .unwrap_or(true)
    }

    /// Flush and shut down the connection.
    ///
    /// Idempotent. Flush and shutdown each get 500ms before the connection
    /// is dropped anyway.
    pub async fn close(&mut self) -> Result<(), RelayClientError> {
        if let Some(mut framed) = self.writer.get_mut().take() {
            info!(broker = %self.broker, relay_id = %self.relay_id, "Closing relay connection");

            match tokio::time::timeout(CLOSE_TIMEOUT, framed.close()).await {
                Ok(Ok(())) => debug!("Relay connection closed"),
                Ok(Err(e)) => warn!("Error closing relay connection: {}", e),
                Err(_) => warn!("Close timeout ({}ms)", CLOSE_TIMEOUT.as_millis()),
            }
        }

        Ok(())
    }
}

impl ReplySink for RelayClient {
    type Error = RelayClientError;

    async fn send_reply(&self, request: &EnvelopeMeta, message: Message) -> Result<(), Self::Error> {
        let meta = EnvelopeMeta {
            correlation_id: request.correlation_id,
            relay_id: self.relay_id.clone(),
        };
        self.send(Envelope::new(meta, message)).await
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        if self.writer.get_mut().is_some() {
            debug!("RelayClient dropped while connected - connection will be closed");
        }
    }
}
