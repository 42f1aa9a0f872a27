//! Core domain types for geospatial tracking sessions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────

/// Lifecycle state of the tracking session.
///
/// Exactly one value holds at any instant. Only the session controller and
/// its polling loop ever write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No engine session exists
    #[default]
    NotSetup,
    /// `setup` is creating and configuring an engine session
    SettingUp,
    /// Creating or configuring the engine session failed
    SetupFailed,
    /// The device cannot run the tracking engine at all
    Unsupported,
    /// Session exists and is paused
    ReadyToTrack,
    /// Session resumed, engine still localizing
    Pretracking,
    /// Engine reports a usable geospatial pose
    Tracking,
    /// Camera was lost while polling
    CameraUnavailable,
    /// Geospatial (Earth) state left the enabled state while polling
    EarthStateError,
    /// Any other unexpected failure while polling
    FatalUpdateError,
}

impl SessionState {
    /// Every declared state, in declaration order.
    pub const ALL: [SessionState; 10] = [
        SessionState::NotSetup,
        SessionState::SettingUp,
        SessionState::SetupFailed,
        SessionState::Unsupported,
        SessionState::ReadyToTrack,
        SessionState::Pretracking,
        SessionState::Tracking,
        SessionState::CameraUnavailable,
        SessionState::EarthStateError,
        SessionState::FatalUpdateError,
    ];

    /// Stable string tag used on the event stream
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotSetup => "NOT_SETUP",
            SessionState::SettingUp => "SETTING_UP",
            SessionState::SetupFailed => "SETUP_FAILED",
            SessionState::Unsupported => "UNSUPPORTED",
            SessionState::ReadyToTrack => "READY_TO_TRACK",
            SessionState::Pretracking => "PRETRACKING",
            SessionState::Tracking => "TRACKING",
            SessionState::CameraUnavailable => "CAMERA_UNAVAILABLE",
            SessionState::EarthStateError => "EARTH_STATE_ERROR",
            SessionState::FatalUpdateError => "FATAL_UPDATE_ERROR",
        }
    }

    /// Terminal polling faults. Recovery requires close followed by setup.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            SessionState::CameraUnavailable
                | SessionState::EarthStateError
                | SessionState::FatalUpdateError
        )
    }

    /// Tracking has been requested and the polling loop should be live
    pub fn is_tracking_requested(&self) -> bool {
        matches!(self, SessionState::Pretracking | SessionState::Tracking)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown state tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStateTag(pub String);

impl fmt::Display for UnknownStateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session state tag: {}", self.0)
    }
}

impl std::error::Error for UnknownStateTag {}

impl FromStr for SessionState {
    type Err = UnknownStateTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownStateTag(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────
// Pose
// ─────────────────────────────────────────────────────────

/// Camera pose in geospatial coordinates with accuracy bounds.
///
/// The quaternion is `[x, y, z, w]` in the east-up-south frame. Accuracies are
/// in meters, except `orientation_yaw_accuracy` which is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeospatialPose {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub orientation: [f32; 4],
    pub vertical_accuracy: f64,
    pub horizontal_accuracy: f64,
    pub orientation_yaw_accuracy: f64,
}

impl GeospatialPose {
    /// Identity orientation at the given coordinate with zero accuracy bounds
    pub fn at(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            orientation: [0.0, 0.0, 0.0, 1.0],
            vertical_accuracy: 0.0,
            horizontal_accuracy: 0.0,
            orientation_yaw_accuracy: 0.0,
        }
    }
}

// ─────────────────────────────────────────────────────────
// VPS Availability
// ─────────────────────────────────────────────────────────

/// Coverage of the visual positioning service at a coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VpsAvailability {
    Available,
    Unavailable,
    Unknown,
}

impl VpsAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            VpsAvailability::Available => "AVAILABLE",
            VpsAvailability::Unavailable => "UNAVAILABLE",
            VpsAvailability::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for VpsAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
