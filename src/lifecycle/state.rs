//! Server lifecycle state machine.
//!
//! # State Transitions
//! ```text
//! Initialized → Serving       listener bound
//! Serving → ShuttingDown      termination signal consumed
//! ShuttingDown → Stopped      listener quiesced in time
//! (any non-terminal) → Aborted  fatal error
//! ```
//!
//! # Design Decisions
//! - Transitions are one-directional; each state is entered at most once
//! - Only the coordinator holds the writer; everyone else gets a receiver

use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Initialized,
    Serving,
    ShuttingDown,
    Stopped,
    Aborted,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Aborted)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: Self) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (Initialized, Serving) | (Serving, ShuttingDown) | (ShuttingDown, Stopped) => true,
            (current, Aborted) => !current.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Serving => "serving",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writer side of the published lifecycle state.
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<LifecycleState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Initialized);
        Self { tx }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `next` if the transition is legal. Returns whether it happened.
    pub fn advance(&self, next: LifecycleState) -> bool {
        let mut from = LifecycleState::Initialized;
        let moved = self.tx.send_if_modified(|state| {
            from = *state;
            if state.can_advance_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });

        if moved {
            tracing::debug!(from = %from, to = %next, "Lifecycle transition");
            metrics::record_lifecycle_state(next);
        } else {
            tracing::warn!(from = %from, to = %next, "Rejected lifecycle transition");
        }
        moved
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
