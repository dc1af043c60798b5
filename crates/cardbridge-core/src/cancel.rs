//! Cancellation scope threaded through scan, session and relay calls.
//!
//! A [`CancelScope`] wraps a [`CancellationToken`] and records the reason the
//! scope was cancelled. The first recorded cause wins; later calls only
//! cancel.
//!
//! # Examples
//!
//! ```
//! use cardbridge_core::CancelScope;
//!
//! let scope = CancelScope::new();
//! let child = scope.clone();
//!
//! scope.cancel_with_cause("received SIGTERM");
//! assert!(child.is_cancelled());
//! assert_eq!(child.cause().as_deref(), Some("received SIGTERM"));
//! ```

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Cause recorded when [`CancelScope::cancel`] is called without one.
const DEFAULT_CAUSE: &str = "context canceled";

/// Cloneable cancellation handle with a recorded cause.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    cause: Arc<OnceLock<String>>,
}

impl CancelScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with the default cause.
    pub fn cancel(&self) {
        self.cancel_with_cause(DEFAULT_CAUSE);
    }

    /// Cancel and record `cause` unless a cause was already recorded.
    pub fn cancel_with_cause(&self, cause: impl Into<String>) {
        let _ = self.cause.set(cause.into());
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The recorded cause, if the scope was cancelled.
    pub fn cause(&self) -> Option<String> {
        if self.is_cancelled() {
            self.cause.get().cloned()
        } else {
            None
        }
    }

    /// Resolve once the scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Get the cancellation as an error value.
    #[must_use]
    pub fn error(&self) -> Error {
        Error::Cancelled(self.cause().unwrap_or_else(|| DEFAULT_CAUSE.to_string()))
    }

    /// Run `fut` unless the scope is cancelled first.
    ///
    /// Returns `Err(cause)` when cancellation wins. A future that has already
    /// completed is never reported as cancelled.
    pub async fn run<F: Future>(&self, fut: F) -> std::result::Result<F::Output, String> {
        tokio::select! {
            biased;
            output = fut => Ok(output),
            _ = self.token.cancelled() => {
                Err(self.cause().unwrap_or_else(|| DEFAULT_CAUSE.to_string()))
            }
        }
    }
}
