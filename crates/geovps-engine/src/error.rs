//! Engine-level faults and their mapping onto the session error taxonomy
//!
//! Every engine call site in the controller converts an [`EngineError`] into
//! exactly one taxonomy value through the `From` impls below.

use geovps_core::{AvailabilityError, OutdatedPackage, SetupError, StartError};
use thiserror::Error;

/// Fault reported by the tracking engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("host context unavailable")]
    ContextUnavailable,

    #[error("device not compatible")]
    DeviceNotCompatible,

    #[error("engine not installed")]
    NotInstalled,

    #[error("user declined installation")]
    UserDeclinedInstallation,

    #[error("engine package too old")]
    ApkTooOld,

    #[error("bundled SDK too old")]
    SdkTooOld,

    #[error("session not paused")]
    SessionNotPaused,

    #[error("camera not available")]
    CameraNotAvailable,

    #[error("security exception: {0}")]
    Security(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("network connection error")]
    Network,

    #[error("not authorized")]
    NotAuthorized,

    #[error("resource exhausted")]
    ResourceExhausted,

    /// The session was already released by the engine
    #[error("session already released")]
    SessionGone,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl EngineError {
    /// The underlying resource no longer exists
    pub fn is_resource_gone(&self) -> bool {
        matches!(self, EngineError::SessionGone)
    }

    pub fn is_camera_unavailable(&self) -> bool {
        matches!(self, EngineError::CameraNotAvailable)
    }
}

impl From<EngineError> for SetupError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ContextUnavailable => SetupError::ContextUnavailable,
            EngineError::DeviceNotCompatible => SetupError::DeviceIncompatible,
            EngineError::NotInstalled => SetupError::EngineNotInstalled,
            EngineError::UserDeclinedInstallation => SetupError::InstallDeclined,
            EngineError::ApkTooOld => SetupError::PackageTooOld(OutdatedPackage::Engine),
            EngineError::SdkTooOld => SetupError::PackageTooOld(OutdatedPackage::Sdk),
            EngineError::Security(message) => SetupError::PermissionDenied(message),
            EngineError::CameraNotAvailable => {
                SetupError::PermissionDenied("camera not available".to_string())
            }
            EngineError::UnsupportedConfiguration(_) => SetupError::GeospatialNotSupported,
            other => SetupError::Fatal(other.to_string()),
        }
    }
}

impl From<EngineError> for StartError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::SessionNotPaused => StartError::SessionNotPaused,
            EngineError::CameraNotAvailable => StartError::CameraNotAvailable,
            EngineError::Security(_) => StartError::CameraPermissionDenied,
            EngineError::IllegalState(message) => StartError::IllegalState(message),
            EngineError::UnsupportedConfiguration(message) => {
                StartError::UnsupportedConfiguration(message)
            }
            EngineError::SessionGone => StartError::SessionNotInitialized,
            other => StartError::Fatal(other.to_string()),
        }
    }
}

impl From<EngineError> for AvailabilityError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Network => AvailabilityError::NetworkConnection,
            EngineError::NotAuthorized => AvailabilityError::NotAuthorized,
            EngineError::ResourceExhausted => AvailabilityError::ResourceExhausted,
            EngineError::Security(_) => AvailabilityError::PermissionNotGranted,
            EngineError::SessionGone => AvailabilityError::SessionNotInitialized,
            other => AvailabilityError::Internal(other.to_string()),
        }
    }
}
