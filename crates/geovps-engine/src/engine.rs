//! The tracking engine capability consumed by the session controller
//!
//! The engine is an opaque hardware/vendor SDK. The controller only ever talks
//! to it through [`TrackingEngine`]; every method is a short synchronous call
//! except [`TrackingEngine::close`], which may block and is always run on a
//! blocking worker, and [`TrackingEngine::check_vps_availability`], which
//! reports its result through a callback from an engine-owned thread.

use std::sync::atomic::{AtomicU64, Ordering};

use geovps_core::{GeospatialPose, VpsAvailability};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Global handle ID counter
static HANDLE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique handle ID
pub fn next_handle_id() -> u64 {
    HANDLE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Opaque reference to a live engine session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineHandle {
    id: u64,
}

impl EngineHandle {
    /// Mint a handle with a process-unique ID
    pub fn new() -> Self {
        Self {
            id: next_handle_id(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engine-session-{}", self.id)
    }
}

// ─────────────────────────────────────────────────────────
// Engine-reported conditions
// ─────────────────────────────────────────────────────────

/// Result of the engine's device support check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAvailability {
    SupportedInstalled,
    SupportedNotInstalled,
    SupportedApkTooOld,
    UnsupportedDeviceNotCapable,
    /// The check is still running in the background
    UnknownChecking,
    UnknownTimedOut,
    UnknownError,
}

impl EngineAvailability {
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            EngineAvailability::SupportedInstalled
                | EngineAvailability::SupportedNotInstalled
                | EngineAvailability::SupportedApkTooOld
        )
    }

    /// Supported, but an install or update step is needed first
    pub fn needs_install(&self) -> bool {
        matches!(
            self,
            EngineAvailability::SupportedNotInstalled | EngineAvailability::SupportedApkTooOld
        )
    }

    /// The answer may change if asked again later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineAvailability::UnknownChecking | EngineAvailability::UnknownTimedOut
        )
    }
}

/// Outcome of asking the engine to install itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    /// An out-of-band install flow was started; ask again once it finishes
    InstallRequested,
}

/// State of the engine's geospatial (Earth) capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarthState {
    Enabled,
    ErrorInternal,
    ErrorNotAuthorized,
    ErrorResourceExhausted,
    ErrorPackageTooOld,
    ErrorGeospatialModeDisabled,
}

impl EarthState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, EarthState::Enabled)
    }
}

/// Geospatial tracking state reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Tracking,
    Paused,
    Stopped,
}

// ─────────────────────────────────────────────────────────
// Configuration passed to the engine
// ─────────────────────────────────────────────────────────

/// Camera used by the engine session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

/// Options used when creating an engine session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub camera: CameraFacing,
}

/// Geospatial mode requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeospatialMode {
    #[default]
    Enabled,
    Disabled,
}

/// Configuration applied to a freshly created session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default)]
    pub geospatial_mode: GeospatialMode,
}

/// Callback receiving the result of an asynchronous availability query
pub type AvailabilityCallback =
    Box<dyn FnOnce(Result<VpsAvailability, EngineError>) + Send + 'static>;

// ─────────────────────────────────────────────────────────
// Engine capability
// ─────────────────────────────────────────────────────────

/// Hardware-backed geospatial tracking engine.
///
/// Implementations must be safe to call from the command caller and the
/// polling task at the same time; the controller guarantees that state
/// changing calls on one handle never overlap.
///
/// Availability, install, creation, configuration and `close` run on a
/// blocking worker. Every other call is made with the session lock held and
/// must return promptly.
#[cfg_attr(any(test, feature = "test-helpers"), mockall::automock)]
pub trait TrackingEngine: Send + Sync + 'static {
    /// Check whether this device can run the engine
    fn check_availability(&self) -> EngineAvailability;

    /// Ask the engine to install or update itself.
    ///
    /// `user_requested` is true the first time in an install cycle.
    fn request_install(&self, user_requested: bool) -> Result<InstallStatus, EngineError>;

    fn create_session(&self, config: &SessionConfig) -> Result<EngineHandle, EngineError>;

    /// Whether the session can run in geospatial mode on this device
    fn is_geospatial_supported(&self, handle: &EngineHandle) -> bool;

    fn configure(&self, handle: &EngineHandle, config: &GeoConfig) -> Result<(), EngineError>;

    /// Resume frame delivery. Called with the session lock held.
    fn resume(&self, handle: &EngineHandle) -> Result<(), EngineError>;

    /// Suspend frame delivery. Called with the session lock held.
    fn pause(&self, handle: &EngineHandle) -> Result<(), EngineError>;

    /// Release the session. May block.
    fn close(&self, handle: &EngineHandle) -> Result<(), EngineError>;

    /// Advance the session by one frame
    fn update(&self, handle: &EngineHandle) -> Result<(), EngineError>;

    /// `None` when the geospatial capability is unavailable for this session
    fn earth_state(&self, handle: &EngineHandle) -> Option<EarthState>;

    fn tracking_state(&self, handle: &EngineHandle) -> TrackingState;

    fn camera_geospatial_pose(&self, handle: &EngineHandle) -> GeospatialPose;

    /// Query coverage at a coordinate; `callback` fires exactly once
    fn check_vps_availability(
        &self,
        handle: &EngineHandle,
        latitude: f64,
        longitude: f64,
        callback: AvailabilityCallback,
    );
}
