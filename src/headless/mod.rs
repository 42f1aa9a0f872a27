//! Headless mode - NDJSON event output
//!
//! The `geovps` binary drives a session without any UI and reports what
//! happens as newline-delimited JSON on stdout, one event per line, each
//! with an `"event"` field naming its type.
//!
//! # Example Output
//!
//! ```json
//! {"event":"state_changed","previous":"NOT_SETUP","state":"SETTING_UP","timestamp":1704700001000}
//! {"event":"pose","pose":{"latitude":37.422,"longitude":-122.0841,...},"timestamp":1704700002000}
//! {"event":"availability","latitude":37.42,"longitude":-122.08,"availability":"AVAILABLE","timestamp":1704700003000}
//! ```

pub mod runner;

use std::io::{self, Write};

use chrono::Utc;
use geovps_core::prelude::error;
use geovps_core::{GeospatialPose, SessionEvent, SessionState, VpsAvailability};
use serde::Serialize;

/// Events emitted in headless mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// The session moved between lifecycle states
    StateChanged {
        previous: SessionState,
        state: SessionState,
        timestamp: i64,
    },

    /// Diagnostic line from the polling loop
    Diagnostic { message: String, timestamp: i64 },

    /// Periodic camera pose sample
    Pose {
        pose: GeospatialPose,
        timestamp: i64,
    },

    /// Result of a VPS availability query
    Availability {
        latitude: f64,
        longitude: f64,
        availability: VpsAvailability,
        timestamp: i64,
    },

    /// A session operation failed
    Error {
        operation: String,
        code: String,
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    /// The run finished
    Completed {
        final_state: SessionState,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn pose(pose: GeospatialPose) -> Self {
        Self::Pose {
            pose,
            timestamp: Self::now(),
        }
    }

    pub fn availability(latitude: f64, longitude: f64, availability: VpsAvailability) -> Self {
        Self::Availability {
            latitude,
            longitude,
            availability,
            timestamp: Self::now(),
        }
    }

    pub fn error(operation: &str, code: &str, message: impl Into<String>, fatal: bool) -> Self {
        Self::Error {
            operation: operation.to_string(),
            code: code.to_string(),
            message: message.into(),
            fatal,
            timestamp: Self::now(),
        }
    }

    pub fn completed(final_state: SessionState) -> Self {
        Self::Completed {
            final_state,
            timestamp: Self::now(),
        }
    }
}

impl From<&SessionEvent> for HeadlessEvent {
    fn from(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::StateChanged { previous, state } => Self::StateChanged {
                previous: *previous,
                state: *state,
                timestamp: Self::now(),
            },
            SessionEvent::Diagnostic { message } => Self::Diagnostic {
                message: message.clone(),
                timestamp: Self::now(),
            },
        }
    }
}
