//! Card session setup and teardown.
//!
//! A [`CardSession`] owns one open reader and one connected card. Setup
//! never leaks the radio link: when a later step fails, everything opened so
//! far is closed before the error is returned. Teardown always closes the
//! card before the reader and runs both steps even if the first fails.

use cardbridge_core::{CancelScope, CardProtocol, MacAddress};
use cardbridge_hardware::{CardReader, CardReaderDriver, SmartCard};
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// An established reader connection with a connected card.
#[derive(Debug)]
pub struct CardSession<R: CardReader> {
    reader: R,
    card: R::Card,
    address: MacAddress,
    protocol: CardProtocol,
    atr: Vec<u8>,
}

/// Open the reader at `address`, connect the card in the `protocol` slot and
/// read its ATR.
///
/// Each step is raced against `scope`; cancellation goes through the same
/// cleanup as a failed step.
///
/// # Errors
///
/// - [`SessionError::ReaderConnect`] if the reader cannot be opened
/// - [`SessionError::CardConnect`] if no card answers (the reader is closed)
/// - [`SessionError::Atr`] if the ATR read fails (card and reader are closed)
/// - [`SessionError::Cancelled`] if `scope` is cancelled during setup
pub async fn connect_card<D>(
    scope: &CancelScope,
    driver: &D,
    address: MacAddress,
    protocol: CardProtocol,
) -> Result<CardSession<D::Reader>, SessionError>
where
    D: CardReaderDriver,
{
    if let Some(cause) = scope.cause() {
        return Err(SessionError::Cancelled { cause });
    }

    let mut reader = match scope.run(driver.open(address)).await {
        Ok(Ok(reader)) => reader,
        Ok(Err(source)) => return Err(SessionError::ReaderConnect { address, source }),
        Err(cause) => return Err(SessionError::Cancelled { cause }),
    };
    debug!(%address, "Reader connected");

    let mut card = match scope.run(reader.connect(protocol)).await {
        Ok(Ok(card)) => card,
        Ok(Err(source)) => {
            close_reader(&mut reader).await;
            return Err(SessionError::CardConnect { protocol, source });
        }
        Err(cause) => {
            close_reader(&mut reader).await;
            return Err(SessionError::Cancelled { cause });
        }
    };

    let atr = match scope.run(card.atr()).await {
        Ok(Ok(atr)) => atr,
        Ok(Err(source)) => {
            close_card(&mut card).await;
            close_reader(&mut reader).await;
            return Err(SessionError::Atr(source));
        }
        Err(cause) => {
            close_card(&mut card).await;
            close_reader(&mut reader).await;
            return Err(SessionError::Cancelled { cause });
        }
    };

    if !atr.is_empty() {
        info!(atr = %hex::encode_upper(&atr), %protocol, "Card connected");
    }

    Ok(CardSession {
        reader,
        card,
        address,
        protocol,
        atr,
    })
}

impl<R: CardReader> CardSession<R> {
    /// Send a command APDU to the card.
    pub async fn exchange(&mut self, command: &[u8]) -> cardbridge_hardware::Result<Vec<u8>> {
        self.card.exchange(command).await
    }

    /// Send a vendor control command to the reader.
    pub async fn control(&mut self, code: u16, data: &[u8]) -> cardbridge_hardware::Result<Vec<u8>> {
        self.card.control(code, data).await
    }

    /// ATR read when the session was established.
    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    pub fn device_name(&self) -> String {
        self.card.device_name()
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn protocol(&self) -> CardProtocol {
        self.protocol
    }

    /// Close the card, then the reader.
    ///
    /// Errors are logged; the reader is closed even if closing the card fails.
    pub async fn close(mut self) {
        close_card(&mut self.card).await;
        close_reader(&mut self.reader).await;
        debug!(address = %self.address, "Card session closed");
    }
}

async fn close_card<C: SmartCard>(card: &mut C) {
    if let Err(e) = card.close().await {
        warn!(error = %e, "Failed to close card");
    }
}

async fn close_reader<R: CardReader>(reader: &mut R) {
    if let Err(e) = reader.close().await {
        warn!(error = %e, "Failed to close reader");
    }
}
