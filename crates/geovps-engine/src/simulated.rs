//! Deterministic in-process engine used by the CLI and demos
//!
//! `SimulatedEngine` behaves like a device that localizes after a fixed number
//! of frames, then walks along a constant heading with steadily improving
//! accuracy. Coverage is a disc around the starting coordinate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use geovps_core::prelude::{debug, trace};
use geovps_core::{GeospatialPose, VpsAvailability};
use serde::{Deserialize, Serialize};

use crate::engine::{
    AvailabilityCallback, CameraFacing, EarthState, EngineAvailability, EngineHandle, GeoConfig,
    GeospatialMode, InstallStatus, SessionConfig, TrackingEngine, TrackingState,
};
use crate::error::EngineError;

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Behaviour of the simulated device (`[simulation]` in config.toml)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Whether the device can run the engine at all
    pub supported: bool,
    /// Whether the engine starts out installed
    pub installed: bool,
    /// Frames of `update` before the engine reports tracking
    pub frames_to_localize: u32,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub start_altitude: f64,
    /// Walking direction, degrees clockwise from north
    pub heading_degrees: f64,
    /// Distance moved per tracked frame
    pub step_meters: f64,
    /// Radius of VPS coverage around the start coordinate
    pub coverage_radius_km: f64,
    /// Fail `update` with camera-unavailable after this many frames
    pub camera_fail_after: Option<u32>,
    /// Delay before availability callbacks fire
    pub availability_latency_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            supported: true,
            installed: true,
            frames_to_localize: 20,
            start_latitude: 37.422,
            start_longitude: -122.0841,
            start_altitude: 10.0,
            heading_degrees: 0.0,
            step_meters: 0.05,
            coverage_radius_km: 25.0,
            camera_fail_after: None,
            availability_latency_ms: 50,
        }
    }
}

#[derive(Debug)]
struct SimSession {
    camera: CameraFacing,
    mode: GeospatialMode,
    paused: bool,
    frames: u32,
    pose: GeospatialPose,
}

/// In-process engine with scripted, deterministic behaviour
#[derive(Debug)]
pub struct SimulatedEngine {
    config: SimulationConfig,
    installed: AtomicBool,
    sessions: Mutex<HashMap<u64, SimSession>>,
}

impl SimulatedEngine {
    pub fn new(config: SimulationConfig) -> Self {
        let installed = AtomicBool::new(config.installed);
        Self {
            config,
            installed,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of sessions that have not been closed
    pub fn live_sessions(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, SimSession>> {
        // A poisoned map only means a panicking caller; the data is still usable.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_session<T>(
        &self,
        handle: &EngineHandle,
        f: impl FnOnce(&mut SimSession) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&handle.id())
            .ok_or(EngineError::SessionGone)?;
        f(session)
    }

    fn start_pose(&self) -> GeospatialPose {
        GeospatialPose {
            latitude: self.config.start_latitude,
            longitude: self.config.start_longitude,
            altitude: self.config.start_altitude,
            orientation: heading_quaternion(self.config.heading_degrees),
            vertical_accuracy: 10.0,
            horizontal_accuracy: 25.0,
            orientation_yaw_accuracy: 45.0,
        }
    }

    fn is_localized(&self, session: &SimSession) -> bool {
        session.frames >= self.config.frames_to_localize
    }

    fn advance(&self, session: &mut SimSession) {
        let heading = self.config.heading_degrees.to_radians();
        let pose = &mut session.pose;
        pose.latitude += self.config.step_meters * heading.cos() / METERS_PER_DEGREE_LAT;
        pose.longitude += self.config.step_meters * heading.sin()
            / (METERS_PER_DEGREE_LAT * pose.latitude.to_radians().cos());

        let tracked = f64::from(session.frames - self.config.frames_to_localize + 1);
        pose.horizontal_accuracy = (25.0 / (1.0 + tracked / 10.0)).max(0.5);
        pose.vertical_accuracy = (10.0 / (1.0 + tracked / 10.0)).max(0.5);
        pose.orientation_yaw_accuracy = (45.0 / (1.0 + tracked / 10.0)).max(1.0);
    }

    fn coverage_at(&self, latitude: f64, longitude: f64) -> VpsAvailability {
        let distance = haversine_km(
            self.config.start_latitude,
            self.config.start_longitude,
            latitude,
            longitude,
        );
        if distance <= self.config.coverage_radius_km {
            VpsAvailability::Available
        } else {
            VpsAvailability::Unavailable
        }
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl TrackingEngine for SimulatedEngine {
    fn check_availability(&self) -> EngineAvailability {
        if !self.config.supported {
            EngineAvailability::UnsupportedDeviceNotCapable
        } else if !self.installed.load(Ordering::Acquire) {
            EngineAvailability::SupportedNotInstalled
        } else {
            EngineAvailability::SupportedInstalled
        }
    }

    fn request_install(&self, user_requested: bool) -> Result<InstallStatus, EngineError> {
        if self.installed.load(Ordering::Acquire) {
            return Ok(InstallStatus::Installed);
        }
        if !user_requested {
            return Err(EngineError::NotInstalled);
        }
        // The simulated install completes as soon as it is requested.
        debug!("Simulated engine install requested");
        self.installed.store(true, Ordering::Release);
        Ok(InstallStatus::InstallRequested)
    }

    fn create_session(&self, config: &SessionConfig) -> Result<EngineHandle, EngineError> {
        if !self.config.supported {
            return Err(EngineError::DeviceNotCompatible);
        }
        if !self.installed.load(Ordering::Acquire) {
            return Err(EngineError::NotInstalled);
        }

        let handle = EngineHandle::new();
        self.lock().insert(
            handle.id(),
            SimSession {
                camera: config.camera,
                mode: GeospatialMode::Disabled,
                paused: true,
                frames: 0,
                pose: self.start_pose(),
            },
        );
        debug!("Simulated session {} created", handle);
        Ok(handle)
    }

    fn is_geospatial_supported(&self, handle: &EngineHandle) -> bool {
        self.with_session(handle, |s| Ok(s.camera == CameraFacing::Back))
            .unwrap_or(false)
    }

    fn configure(&self, handle: &EngineHandle, config: &GeoConfig) -> Result<(), EngineError> {
        self.with_session(handle, |s| {
            if s.camera == CameraFacing::Front && config.geospatial_mode == GeospatialMode::Enabled
            {
                return Err(EngineError::UnsupportedConfiguration(
                    "geospatial mode requires the back camera".to_string(),
                ));
            }
            s.mode = config.geospatial_mode;
            Ok(())
        })
    }

    fn resume(&self, handle: &EngineHandle) -> Result<(), EngineError> {
        self.with_session(handle, |s| {
            s.paused = false;
            Ok(())
        })
    }

    fn pause(&self, handle: &EngineHandle) -> Result<(), EngineError> {
        self.with_session(handle, |s| {
            s.paused = true;
            Ok(())
        })
    }

    fn close(&self, handle: &EngineHandle) -> Result<(), EngineError> {
        match self.lock().remove(&handle.id()) {
            Some(_) => {
                debug!("Simulated session {} closed", handle);
                Ok(())
            }
            None => Err(EngineError::SessionGone),
        }
    }

    fn update(&self, handle: &EngineHandle) -> Result<(), EngineError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&handle.id())
            .ok_or(EngineError::SessionGone)?;

        if session.paused {
            return Err(EngineError::IllegalState(
                "update called on a paused session".to_string(),
            ));
        }

        session.frames += 1;
        if let Some(limit) = self.config.camera_fail_after {
            if session.frames > limit {
                return Err(EngineError::CameraNotAvailable);
            }
        }

        if self.is_localized(session) {
            self.advance(session);
        }
        trace!("Simulated session {} frame {}", handle, session.frames);
        Ok(())
    }

    fn earth_state(&self, handle: &EngineHandle) -> Option<EarthState> {
        self.with_session(handle, |s| {
            Ok(match s.mode {
                GeospatialMode::Enabled => Some(EarthState::Enabled),
                GeospatialMode::Disabled => None,
            })
        })
        .ok()
        .flatten()
    }

    fn tracking_state(&self, handle: &EngineHandle) -> TrackingState {
        self.with_session(handle, |s| {
            Ok(if s.paused || !self.is_localized(s) {
                TrackingState::Paused
            } else {
                TrackingState::Tracking
            })
        })
        .unwrap_or(TrackingState::Stopped)
    }

    fn camera_geospatial_pose(&self, handle: &EngineHandle) -> GeospatialPose {
        self.with_session(handle, |s| Ok(s.pose))
            .unwrap_or_else(|_| self.start_pose())
    }

    fn check_vps_availability(
        &self,
        handle: &EngineHandle,
        latitude: f64,
        longitude: f64,
        callback: AvailabilityCallback,
    ) {
        let result = if !self.lock().contains_key(&handle.id()) {
            Err(EngineError::SessionGone)
        } else if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            Err(EngineError::Internal(format!(
                "invalid coordinate ({}, {})",
                latitude, longitude
            )))
        } else {
            Ok(self.coverage_at(latitude, longitude))
        };

        let latency = Duration::from_millis(self.config.availability_latency_ms);
        std::thread::spawn(move || {
            std::thread::sleep(latency);
            callback(result);
        });
    }
}

/// Yaw-only orientation in the east-up-south frame
fn heading_quaternion(heading_degrees: f64) -> [f32; 4] {
    let half = heading_degrees.to_radians() / 2.0;
    [0.0, half.sin() as f32, 0.0, half.cos() as f32]
}

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
