// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Server state machine with typed state transitions.
//!
//! Implements the server lifecycle: Starting → Listening → Draining → Stopped.
//! Invalid transitions result in StateTransitionError.


use serde::Serialize;

use crate::error::StateTransitionError;

/// Broadcast server lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerState {
    /// Store attached, socket not yet listening.
    Starting,

    /// Accepting connections and serving snapshots.
    Listening,

    /// No new connections; open ones finish their current response.
    Draining,

    /// Listener closed, every connection gone.
    Stopped,
}

impl ServerState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Listening => "Listening",
            Self::Draining => "Draining",
            Self::Stopped => "Stopped",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: ServerState) -> bool {
        matches!(
            (self, target),
            (Self::Starting, Self::Listening)
                | (Self::Starting, Self::Stopped)
                | (Self::Listening, Self::Draining)
                | (Self::Draining, Self::Stopped)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tracks the server's state and how often it changed.
#[derive(Debug)]
pub struct ServerLifecycle {
    current_state: ServerState,
    transition_count: u64,
}

impl Default for ServerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerLifecycle {
    pub fn new() -> Self {
        Self {
            current_state: ServerState::Starting,
            transition_count: 0,
        }
    }

    pub fn state(&self) -> ServerState {
        self.current_state
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: ServerState) -> Result<(), StateTransitionError> {
        if self.current_state.is_terminal() {
            return Err(StateTransitionError::TerminalState {
                state: self.current_state.name(),
            });
        }

        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            from = self.current_state.name(),
            to = target.name(),
            "Server state transition"
        );

        self.current_state = target;
        self.transition_count += 1;

        Ok(())
    }
}
