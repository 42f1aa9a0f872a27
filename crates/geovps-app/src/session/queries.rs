//! Read-only queries against the live session
//!
//! Both queries report `SessionNotInitialized` when there is no session or
//! the polling loop has faulted it.

use geovps_core::prelude::{debug, warn};
use geovps_core::{AvailabilityError, GeospatialPose, PoseError, VpsAvailability};
use geovps_engine::{TrackingEngine, TrackingState};
use tokio::sync::oneshot;

use super::controller::SessionController;

impl<E: TrackingEngine> SessionController<E> {
    /// Current camera pose in geospatial coordinates.
    ///
    /// Fails with `EarthNotAvailable` when the geospatial capability is
    /// absent and `EarthNotTracking` until the engine has localized.
    pub fn camera_geospatial_pose(&self) -> Result<GeospatialPose, PoseError> {
        let core = self.shared.lock();
        let handle = self
            .shared
            .live_handle(&core)
            .ok_or(PoseError::SessionNotInitialized)?;

        let engine = &self.shared.engine;
        if engine.earth_state(&handle).is_none() {
            return Err(PoseError::EarthNotAvailable);
        }
        if engine.tracking_state(&handle) != TrackingState::Tracking {
            return Err(PoseError::EarthNotTracking);
        }

        Ok(engine.camera_geospatial_pose(&handle))
    }

    /// Ask the engine whether positioning coverage exists at a coordinate.
    ///
    /// Resolves once the engine's callback fires. Coordinates are passed
    /// through unvalidated.
    pub async fn check_vps_availability(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<VpsAvailability, AvailabilityError> {
        let rx = {
            let core = self.shared.lock();
            let handle = self
                .shared
                .live_handle(&core)
                .ok_or(AvailabilityError::SessionNotInitialized)?;

            debug!(
                "Checking VPS availability at ({}, {}) on {}",
                latitude, longitude, handle
            );

            let (tx, rx) = oneshot::channel();
            self.shared.engine.check_vps_availability(
                &handle,
                latitude,
                longitude,
                Box::new(move |result| {
                    // Receiver gone means the caller stopped waiting.
                    let _ = tx.send(result);
                }),
            );
            rx
        };

        match rx.await {
            Ok(result) => result.map_err(|e| {
                debug!("VPS availability query failed: {}", e);
                AvailabilityError::from(e)
            }),
            Err(_) => {
                warn!("Engine dropped the VPS availability callback");
                Err(AvailabilityError::Internal(
                    "availability callback dropped without a result".to_string(),
                ))
            }
        }
    }
}
