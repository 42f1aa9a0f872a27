//! Configuration types for GeoVPS
//!
//! Defines `Settings`, the contents of `.geovps/config.toml`, and its
//! per-section sub-types.

use std::time::Duration;

use geovps_engine::{CameraFacing, GeoConfig, GeospatialMode, SessionConfig, SimulationConfig};
use serde::{Deserialize, Serialize};

/// Lower bound for the polling cadence
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Global application settings from `.geovps/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Polling loop cadence
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollingSettings {
    /// Milliseconds between engine updates while tracking is requested
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollingSettings {
    /// Tick interval, clamped to [`MIN_POLL_INTERVAL_MS`]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

fn default_interval_ms() -> u64 {
    100
}

/// How the engine session is created and configured
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub camera: CameraFacing,

    #[serde(default)]
    pub geospatial_mode: GeospatialMode,

    /// Ask the engine to install itself when missing or outdated
    #[serde(default = "default_true")]
    pub request_install: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            camera: CameraFacing::default(),
            geospatial_mode: GeospatialMode::default(),
            request_install: true,
        }
    }
}

impl SessionSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            camera: self.camera,
        }
    }

    pub fn geo_config(&self) -> GeoConfig {
        GeoConfig {
            geospatial_mode: self.geospatial_mode,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Event delivery options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventSettings {
    /// Publish diagnostic lines from the polling loop
    #[serde(default)]
    pub diagnostics: bool,

    /// Capacity of the async event stream
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            diagnostics: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    crate::event_bus::DEFAULT_CHANNEL_CAPACITY
}
