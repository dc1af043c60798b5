//! Bridge process state machine.
//!
//! # States
//!
//! - `Idle`: started, no hardware touched yet
//! - `Scanning`: looking for the reader
//! - `Connecting`: opening the reader and card session
//! - `Ready`: session established, relay messages are serviced
//! - `Closing`: tearing down relay and session
//! - `Terminated`: done
//!
//! # Valid Transitions
//!
//! - Idle → Scanning → Connecting → Ready → Closing → Terminated
//! - Scanning / Connecting → Closing (shutdown signal or setup failure)
//! - Idle → Terminated (failure before any hardware interaction)
//!
//! # Examples
//!
//! ```
//! use cardbridge_relay::{BridgeState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(BridgeState::Scanning).unwrap();
//! assert!(machine.transition_to(BridgeState::Ready).is_err());
//! assert_eq!(machine.current_state(), &BridgeState::Scanning);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use cardbridge_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of transitions kept in history.
///
/// A full run is six transitions, so this always holds a complete lifecycle.
pub const MAX_HISTORY_SIZE: usize = 32;

/// Lifecycle state of the bridge process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Idle,
    Scanning,
    Connecting,
    /// Session established and dispatcher registered.
    Ready,
    Closing,
    Terminated,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            BridgeState::Idle => "Idle",
            BridgeState::Scanning => "Scanning",
            BridgeState::Connecting => "Connecting",
            BridgeState::Ready => "Ready",
            BridgeState::Closing => "Closing",
            BridgeState::Terminated => "Terminated",
        };
        write!(f, "{}", state_str)
    }
}

impl BridgeState {
    /// Check if moving to `target` is allowed from this state.
    ///
    /// ```
    /// use cardbridge_relay::BridgeState;
    ///
    /// assert!(BridgeState::Ready.can_transition_to(&BridgeState::Closing));
    /// assert!(!BridgeState::Closing.can_transition_to(&BridgeState::Ready));
    /// ```
    pub fn can_transition_to(&self, target: &BridgeState) -> bool {
        matches!(
            (self, target),
            // From Idle
            (BridgeState::Idle, BridgeState::Scanning | BridgeState::Terminated)
            // From Scanning
            | (BridgeState::Scanning, BridgeState::Connecting | BridgeState::Closing)
            // From Connecting
            | (BridgeState::Connecting, BridgeState::Ready | BridgeState::Closing)
            // From Ready
            | (BridgeState::Ready, BridgeState::Closing)
            // From Closing
            | (BridgeState::Closing, BridgeState::Terminated)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeState::Terminated)
    }
}

/// A single recorded transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: BridgeState,
    pub to: BridgeState,

    /// Not serialized; set to the deserialization time on load.
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: BridgeState, to: BridgeState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Tracks the bridge lifecycle and rejects out-of-order transitions.
///
/// Not thread-safe; the orchestrator owns it on its own task.
#[derive(Debug)]
pub struct StateMachine {
    current_state: BridgeState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new state machine in the `Idle` state.
    pub fn new() -> Self {
        Self {
            current_state: BridgeState::Idle,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> &BridgeState {
        &self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Relay messages are only serviced in `Ready`.
    pub fn is_serving(&self) -> bool {
        self.current_state == BridgeState::Ready
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .cloned()
            .collect()
    }

    /// Transition to `new_state`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the move is not allowed;
    /// the machine is left unchanged.
    pub fn transition_to(&mut self, new_state: BridgeState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        debug!(from = %transition.from, to = %transition.to, "State transition");

        self.current_state = new_state;
        self.state_entered_at = transition.timestamp;

        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition.clone());

        Ok(transition)
    }

    /// Move to `Closing` unless already closing or done.
    ///
    /// From `Idle` the machine goes straight to `Terminated`.
    pub fn begin_shutdown(&mut self) -> Option<StateTransition> {
        let target = match self.current_state {
            BridgeState::Idle => BridgeState::Terminated,
            BridgeState::Closing | BridgeState::Terminated => return None,
            _ => BridgeState::Closing,
        };
        self.transition_to(target).ok()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ALL: [BridgeState; 6] = [
        BridgeState::Idle,
        BridgeState::Scanning,
        BridgeState::Connecting,
        BridgeState::Ready,
        BridgeState::Closing,
        BridgeState::Terminated,
    ];

    #[test]
    fn test_new_machine_starts_idle() {
        let machine = StateMachine::new();
        assert_eq!(machine.current_state(), &BridgeState::Idle);
        assert!(!machine.is_serving());
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut machine = StateMachine::new();
        for state in &ALL[1..] {
            machine.transition_to(*state).unwrap();
            assert_eq!(machine.is_serving(), *state == BridgeState::Ready);
        }

        assert!(machine.current_state().is_terminal());
        assert_eq!(machine.history().len(), 5);
        let last = machine.last_transitions(1);
        assert_eq!(last[0].from, BridgeState::Closing);
        assert_eq!(last[0].to, BridgeState::Terminated);
    }

    #[rstest]
    #[case(BridgeState::Idle, BridgeState::Scanning, true)]
    #[case(BridgeState::Idle, BridgeState::Terminated, true)]
    #[case(BridgeState::Idle, BridgeState::Closing, false)]
    #[case(BridgeState::Scanning, BridgeState::Closing, true)]
    #[case(BridgeState::Scanning, BridgeState::Ready, false)]
    #[case(BridgeState::Connecting, BridgeState::Closing, true)]
    #[case(BridgeState::Connecting, BridgeState::Scanning, false)]
    #[case(BridgeState::Ready, BridgeState::Closing, true)]
    #[case(BridgeState::Ready, BridgeState::Terminated, false)]
    #[case(BridgeState::Closing, BridgeState::Terminated, true)]
    #[case(BridgeState::Closing, BridgeState::Ready, false)]
    #[case(BridgeState::Terminated, BridgeState::Idle, false)]
    fn test_transition_rules(
        #[case] from: BridgeState,
        #[case] to: BridgeState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn test_no_self_transitions() {
        for state in ALL {
            assert!(!state.can_transition_to(&state), "{state} -> {state}");
        }
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut machine = StateMachine::new();
        let err = machine.transition_to(BridgeState::Ready).unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidStateTransition { ref from, ref to } if from == "Idle" && to == "Ready"
        ));
        assert_eq!(machine.current_state(), &BridgeState::Idle);
        assert!(machine.history().is_empty());
    }

    #[rstest]
    #[case(BridgeState::Idle, Some(BridgeState::Terminated))]
    #[case(BridgeState::Scanning, Some(BridgeState::Closing))]
    #[case(BridgeState::Connecting, Some(BridgeState::Closing))]
    #[case(BridgeState::Ready, Some(BridgeState::Closing))]
    fn test_begin_shutdown(#[case] start: BridgeState, #[case] expected: Option<BridgeState>) {
        let mut machine = StateMachine::new();
        let steps = ALL.iter().position(|s| *s == start).unwrap();
        for state in ALL.iter().skip(1).take(steps) {
            machine.transition_to(*state).unwrap();
        }
        assert_eq!(machine.current_state(), &start);

        assert_eq!(machine.begin_shutdown().map(|t| t.to), expected);
        assert!(machine.begin_shutdown().is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = StateMachine::new();
        machine.transition_to(BridgeState::Scanning).unwrap();
        for _ in 1..MAX_HISTORY_SIZE {
            machine.history.push_back(StateTransition::new(
                BridgeState::Idle,
                BridgeState::Scanning,
            ));
        }
        machine.transition_to(BridgeState::Connecting).unwrap();

        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
        assert_eq!(machine.history().back().map(|t| t.to), Some(BridgeState::Connecting));
    }
}
