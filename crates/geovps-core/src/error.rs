//! Error types: infrastructure errors plus the per-operation session taxonomy

use std::path::PathBuf;
use thiserror::Error;

use crate::types::SessionState;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure error types organized by layer
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // ─────────────────────────────────────────────────────────────
    // Session Errors (wrapping the per-operation taxonomy)
    // ─────────────────────────────────────────────────────────────
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Pose(#[from] PoseError),

    #[error(transparent)]
    Availability(#[from] AvailabilityError),

    #[error(transparent)]
    Close(#[from] CloseError),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Setup
// ─────────────────────────────────────────────────────────────────

/// Which side of the engine integration is out of date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutdatedPackage {
    /// The installed engine service is older than this application needs
    Engine,
    /// This application's bundled SDK is older than the installed engine
    Sdk,
}

impl std::fmt::Display for OutdatedPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutdatedPackage::Engine => write!(f, "Tracking engine package"),
            OutdatedPackage::Sdk => write!(f, "Bundled engine SDK"),
        }
    }
}

/// Failure while establishing a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("Host context is unavailable")]
    ContextUnavailable,

    #[error("Tracking engine is not supported on this device")]
    EngineNotSupported,

    #[error("Geospatial mode is not supported on this device")]
    GeospatialNotSupported,

    #[error("User declined installation of the tracking engine")]
    InstallDeclined,

    #[error("Tracking engine is not installed")]
    EngineNotInstalled,

    #[error("Device is not compatible with the tracking engine")]
    DeviceIncompatible,

    #[error("{0} is too old")]
    PackageTooOld(OutdatedPackage),

    #[error("Fatal engine error during setup: {0}")]
    Fatal(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl SetupError {
    /// Stable error code for the result channel
    pub fn code(&self) -> &'static str {
        match self {
            SetupError::ContextUnavailable => "E_CONTEXT_UNAVAILABLE",
            SetupError::EngineNotSupported => "E_ENGINE_NOT_SUPPORTED",
            SetupError::GeospatialNotSupported => "E_GEOSPATIAL_NOT_SUPPORTED",
            SetupError::InstallDeclined => "E_INSTALL_DECLINED",
            SetupError::EngineNotInstalled => "E_ENGINE_NOT_INSTALLED",
            SetupError::DeviceIncompatible => "E_DEVICE_INCOMPATIBLE",
            SetupError::PackageTooOld(OutdatedPackage::Engine) => "E_ENGINE_TOO_OLD",
            SetupError::PackageTooOld(OutdatedPackage::Sdk) => "E_SDK_TOO_OLD",
            SetupError::Fatal(_) => "E_FATAL",
            SetupError::PermissionDenied(_) => "E_PERMISSION_DENIED",
        }
    }

    /// State the session lands in after this failure
    pub fn resulting_state(&self) -> SessionState {
        match self {
            SetupError::EngineNotSupported => SessionState::Unsupported,
            _ => SessionState::SetupFailed,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Start
// ─────────────────────────────────────────────────────────────────

/// Failure while starting tracking
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("Session is not initialized")]
    SessionNotInitialized,

    #[error("Session is not ready to track (state: {0})")]
    SessionNotReady(SessionState),

    #[error("Session is not paused")]
    SessionNotPaused,

    #[error("Camera is not available")]
    CameraNotAvailable,

    #[error("Camera permission denied")]
    CameraPermissionDenied,

    #[error("Illegal engine state: {0}")]
    IllegalState(String),

    #[error("Unsupported session configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Fatal engine error during start: {0}")]
    Fatal(String),
}

impl StartError {
    pub fn code(&self) -> &'static str {
        match self {
            StartError::SessionNotInitialized => "E_SESSION_NOT_INITIALIZED",
            StartError::SessionNotReady(_) => "E_SESSION_NOT_READY",
            StartError::SessionNotPaused => "E_SESSION_NOT_PAUSED",
            StartError::CameraNotAvailable => "E_CAMERA_NOT_AVAILABLE",
            StartError::CameraPermissionDenied => "E_CAMERA_PERMISSION_DENIED",
            StartError::IllegalState(_) => "E_ILLEGAL_STATE",
            StartError::UnsupportedConfiguration(_) => "E_UNSUPPORTED_CONFIGURATION",
            StartError::Fatal(_) => "E_FATAL",
        }
    }

    /// The session was not in a startable state; missing session counts too
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            StartError::SessionNotReady(_) | StartError::SessionNotInitialized
        )
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StartError::Fatal(_))
    }
}

// ─────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────

/// Failure while reading the camera geospatial pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoseError {
    #[error("Session is not initialized")]
    SessionNotInitialized,

    #[error("Geospatial capability is not available")]
    EarthNotAvailable,

    #[error("Geospatial capability is not tracking")]
    EarthNotTracking,
}

impl PoseError {
    pub fn code(&self) -> &'static str {
        match self {
            PoseError::SessionNotInitialized => "E_SESSION_NOT_INITIALIZED",
            PoseError::EarthNotAvailable => "E_EARTH_NOT_AVAILABLE",
            PoseError::EarthNotTracking => "E_EARTH_NOT_TRACKING",
        }
    }
}

/// Failure while checking VPS coverage at a coordinate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvailabilityError {
    #[error("Session is not initialized")]
    SessionNotInitialized,

    #[error("Internal availability error: {0}")]
    Internal(String),

    #[error("Network connection error")]
    NetworkConnection,

    #[error("Not authorized to use the positioning service")]
    NotAuthorized,

    #[error("Positioning service quota exhausted")]
    ResourceExhausted,

    #[error("Permission not granted")]
    PermissionNotGranted,
}

impl AvailabilityError {
    pub fn code(&self) -> &'static str {
        match self {
            AvailabilityError::SessionNotInitialized => "E_SESSION_NOT_INITIALIZED",
            AvailabilityError::Internal(_) => "E_INTERNAL",
            AvailabilityError::NetworkConnection => "E_NETWORK_CONNECTION",
            AvailabilityError::NotAuthorized => "E_NOT_AUTHORIZED",
            AvailabilityError::ResourceExhausted => "E_RESOURCE_EXHAUSTED",
            AvailabilityError::PermissionNotGranted => "E_PERMISSION_NOT_GRANTED",
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Close
// ─────────────────────────────────────────────────────────────────

/// Failure while closing the session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseError {
    #[error("Failed to pause session before close: {0}")]
    Pause(String),

    #[error("Failed to close session: {0}")]
    Close(String),
}

impl CloseError {
    pub fn code(&self) -> &'static str {
        match self {
            CloseError::Pause(_) => "E_PAUSE",
            CloseError::Close(_) => "E_CLOSE",
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
