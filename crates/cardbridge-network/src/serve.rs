//! Receive loop feeding broker requests to the dispatcher.

use cardbridge_core::CancelScope;
use cardbridge_hardware::CardReader;
use cardbridge_relay::RelayDispatcher;
use tracing::{debug, info};

use crate::client::{RelayClient, RelayClientError};

/// Message counts for one serve run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub handled: u64,
    pub unhandled: u64,
}

/// Serve relay requests until `scope` is cancelled or the link fails.
///
/// Requests are handled one at a time in arrival order. A message that
/// fails to dispatch is counted and skipped.
///
/// # Errors
///
/// Returns the client error when the broker closes the connection or sends
/// an undecodable frame. Cancellation returns `Ok`.
pub async fn serve<R: CardReader>(
    client: &mut RelayClient,
    dispatcher: &RelayDispatcher<R>,
    scope: &CancelScope,
) -> Result<ServeStats, RelayClientError> {
    let mut stats = ServeStats::default();
    info!(relay_id = %client.relay_id(), "Serving relay requests");

    loop {
        let envelope = tokio::select! {
            biased;
            _ = scope.cancelled() => {
                debug!(handled = stats.handled, unhandled = stats.unhandled, "Serve loop cancelled");
                return Ok(stats);
            }
            received = client.recv() => received?,
        };

        let handled = dispatcher
            .handle_message(scope, &*client, &envelope.meta, &envelope.message)
            .await;

        if handled {
            stats.handled += 1;
        } else {
            stats.unhandled += 1;
        }
    }
}
