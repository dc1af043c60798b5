//! Relay message dispatch onto the card session.
//!
//! Inbound messages are classified by variant: payloads go to the card,
//! capability requests are answered from the [`RelayInfo`] built when the
//! session was established, and anything else is rejected. A failure only
//! affects the message being handled; the session stays up.

#![allow(async_fn_in_trait)]

use std::sync::Arc;

use cardbridge_core::CancelScope;
use cardbridge_core::constants::MAX_CONTROL_CODE;
use cardbridge_hardware::CardReader;
use cardbridge_protocol::{EnvelopeMeta, Message, Payload, PayloadType, RelayInfo};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::DispatchError;
use crate::session::CardSession;

/// Destination for replies to inbound relay messages.
pub trait ReplySink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send `message` as the reply to the request described by `request`.
    async fn send_reply(&self, request: &EnvelopeMeta, message: Message) -> Result<(), Self::Error>;
}

/// Routes relay messages to a card session.
///
/// The card transport is half-duplex, so session access is serialised
/// behind a mutex even if the transport delivers overlapping requests.
#[derive(Debug)]
pub struct RelayDispatcher<R: CardReader> {
    session: Mutex<CardSession<R>>,
    info: Arc<RelayInfo>,
}

impl<R: CardReader> RelayDispatcher<R> {
    pub fn new(session: CardSession<R>, info: RelayInfo) -> Self {
        Self {
            session: Mutex::new(session),
            info: Arc::new(info),
        }
    }

    /// Capability descriptor served to relay peers.
    pub fn relay_info(&self) -> Arc<RelayInfo> {
        Arc::clone(&self.info)
    }

    /// Give the session back for teardown.
    pub fn into_session(self) -> CardSession<R> {
        self.session.into_inner()
    }

    /// Handle one inbound message, replying through `sink`.
    ///
    /// Returns `false` if the message was not handled; the cause is logged
    /// and no reply is sent.
    pub async fn handle_message<S: ReplySink>(
        &self,
        scope: &CancelScope,
        sink: &S,
        meta: &EnvelopeMeta,
        message: &Message,
    ) -> bool {
        match self.dispatch(scope, sink, meta, message).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    correlation_id = %meta.correlation_id,
                    kind = message.kind(),
                    error = %e,
                    "Failed to handle relay message"
                );
                false
            }
        }
    }

    async fn dispatch<S: ReplySink>(
        &self,
        scope: &CancelScope,
        sink: &S,
        meta: &EnvelopeMeta,
        message: &Message,
    ) -> Result<(), DispatchError> {
        let reply = match message {
            Message::Payload(payload) => {
                if !self.info.supports(payload.payload_type) {
                    return Err(DispatchError::UnsupportedPayloadType(payload.payload_type));
                }
                let response = self.handle_payload(scope, payload).await?;
                Message::Payload(payload.reply(response))
            }
            Message::RequestRelayInfo => Message::RelayInfo(RelayInfo::clone(&self.info)),
            other => return Err(DispatchError::UnsupportedMessage(other.kind())),
        };

        sink.send_reply(meta, reply)
            .await
            .map_err(|e| DispatchError::Reply(Box::new(e)))
    }

    /// Run `payload` against the card and return the raw response.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidControlPayload`] for a reader-control
    ///   payload without a 16-bit control code; the session is not touched
    /// - [`DispatchError::Control`] / [`DispatchError::Exchange`] wrapping
    ///   the session failure
    /// - [`DispatchError::Cancelled`] if `scope` is cancelled first
    pub async fn handle_payload(
        &self,
        scope: &CancelScope,
        payload: &Payload,
    ) -> Result<Vec<u8>, DispatchError> {
        match payload.payload_type {
            PayloadType::PcscReaderControl => {
                let code = payload
                    .control
                    .filter(|code| *code <= MAX_CONTROL_CODE)
                    .ok_or(DispatchError::InvalidControlPayload {
                        control: payload.control,
                    })? as u16;

                debug!(code, len = payload.payload.len(), "Reader control");
                let outcome = scope
                    .run(async {
                        let mut session = self.session.lock().await;
                        session.control(code, &payload.payload).await
                    })
                    .await;

                match outcome {
                    Ok(result) => result.map_err(|source| DispatchError::Control { code, source }),
                    Err(cause) => Err(DispatchError::Cancelled { cause }),
                }
            }
            _ => {
                debug!(len = payload.payload.len(), "Card exchange");
                let outcome = scope
                    .run(async {
                        let mut session = self.session.lock().await;
                        session.exchange(&payload.payload).await
                    })
                    .await;

                match outcome {
                    Ok(result) => result.map_err(DispatchError::Exchange),
                    Err(cause) => Err(DispatchError::Cancelled { cause }),
                }
            }
        }
    }
}
