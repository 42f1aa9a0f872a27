//! Session operations as a service trait
//!
//! Front ends (the headless runner, tests, a future bridge to a host UI) talk
//! to the session through [`VpsSession`] rather than the concrete controller,
//! so they can be driven against any engine.

use geovps_core::{
    AvailabilityError, CloseError, GeospatialPose, PoseError, SessionState, SetupError,
    StartError, VpsAvailability,
};
use geovps_engine::TrackingEngine;

use crate::event_bus::EventBus;
use crate::session::SessionController;

/// The command and query surface of a geospatial tracking session
#[trait_variant::make(VpsSession: Send)]
pub trait LocalVpsSession {
    /// Create and configure the engine session
    async fn setup_ar(&self) -> Result<bool, SetupError>;

    /// Resume the engine and begin polling
    async fn start_tracking(&self) -> Result<bool, StartError>;

    /// Stop polling and pause the engine
    fn stop_tracking(&self) -> bool;

    /// Release the engine session
    async fn close_ar(&self) -> Result<bool, CloseError>;

    /// Query positioning coverage at a coordinate
    async fn check_vps_availability(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<VpsAvailability, AvailabilityError>;

    /// Current camera pose in geospatial coordinates
    fn camera_geospatial_pose(&self) -> Result<GeospatialPose, PoseError>;

    /// Current lifecycle state
    fn vps_state(&self) -> SessionState;

    /// Event delivery for this session
    fn events(&self) -> &EventBus;
}

impl<E: TrackingEngine> VpsSession for SessionController<E> {
    async fn setup_ar(&self) -> Result<bool, SetupError> {
        SessionController::setup_ar(self).await
    }

    async fn start_tracking(&self) -> Result<bool, StartError> {
        SessionController::start_tracking(self).await
    }

    fn stop_tracking(&self) -> bool {
        SessionController::stop_tracking(self)
    }

    async fn close_ar(&self) -> Result<bool, CloseError> {
        SessionController::close_ar(self).await
    }

    async fn check_vps_availability(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<VpsAvailability, AvailabilityError> {
        SessionController::check_vps_availability(self, latitude, longitude).await
    }

    fn camera_geospatial_pose(&self) -> Result<GeospatialPose, PoseError> {
        SessionController::camera_geospatial_pose(self)
    }

    fn vps_state(&self) -> SessionState {
        self.state()
    }

    fn events(&self) -> &EventBus {
        SessionController::events(self)
    }
}
