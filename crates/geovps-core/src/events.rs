//! Session event definitions published to subscribers

use serde::Serialize;

use crate::types::SessionState;

/// Event published by the session's event bus.
///
/// `StateChanged` is emitted exactly once per committed transition, in commit
/// order. `Diagnostic` carries free-form debug lines and is only published
/// when diagnostics are enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session state changed
    StateChanged {
        previous: SessionState,
        state: SessionState,
    },

    /// Debug-only diagnostic line
    Diagnostic { message: String },
}

impl SessionEvent {
    pub fn state_changed(previous: SessionState, state: SessionState) -> Self {
        Self::StateChanged { previous, state }
    }

    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self::Diagnostic {
            message: message.into(),
        }
    }

    /// Returns a short string label for this event type (for logging/debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Diagnostic { .. } => "diagnostic",
        }
    }

    /// The new state, if this is a state change
    pub fn new_state(&self) -> Option<SessionState> {
        match self {
            Self::StateChanged { state, .. } => Some(*state),
            Self::Diagnostic { .. } => None,
        }
    }
}
