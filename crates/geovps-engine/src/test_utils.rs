//! Test utilities for engine consumers
//!
//! Provides [`ScriptedEngine`], a [`TrackingEngine`] whose every answer can be
//! set from the test, plus a log of the calls it received.

use std::collections::VecDeque;
use std::sync::Mutex;

use geovps_core::{GeospatialPose, VpsAvailability};

use crate::engine::{
    AvailabilityCallback, EarthState, EngineAvailability, EngineHandle, GeoConfig, InstallStatus,
    SessionConfig, TrackingEngine, TrackingState,
};
use crate::error::EngineError;

/// Mutable script behind a [`ScriptedEngine`]
#[derive(Debug)]
pub struct Script {
    pub availability: EngineAvailability,
    pub install: VecDeque<Result<InstallStatus, EngineError>>,
    pub create: Option<EngineError>,
    pub geospatial_supported: bool,
    pub configure: Option<EngineError>,
    pub resume: VecDeque<Result<(), EngineError>>,
    pub pause: Option<EngineError>,
    pub close: Option<EngineError>,
    /// Results handed out by `update`, one per call; `Ok` once drained
    pub update: VecDeque<Result<(), EngineError>>,
    pub earth_state: Option<EarthState>,
    pub tracking_state: TrackingState,
    pub pose: GeospatialPose,
    pub vps: Result<VpsAvailability, EngineError>,
    /// Hold availability callbacks instead of firing them
    pub hold_vps_callbacks: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            availability: EngineAvailability::SupportedInstalled,
            install: VecDeque::new(),
            create: None,
            geospatial_supported: true,
            configure: None,
            resume: VecDeque::new(),
            pause: None,
            close: None,
            update: VecDeque::new(),
            earth_state: Some(EarthState::Enabled),
            tracking_state: TrackingState::Paused,
            pose: test_pose(),
            vps: Ok(VpsAvailability::Available),
            hold_vps_callbacks: false,
        }
    }
}

/// Engine whose behaviour is fully driven by a [`Script`].
///
/// Calls are recorded by name so tests can assert on ordering, e.g. that
/// `pause` ran before `close`.
#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<Script>,
    calls: Mutex<Vec<&'static str>>,
    held_callbacks: Mutex<Vec<AvailabilityCallback>>,
    live: Mutex<Vec<EngineHandle>>,
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("calls", &self.calls())
            .field("live", &self.live_handles())
            .finish()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit the script in place
    pub fn script(&self, f: impl FnOnce(&mut Script)) {
        let mut script = self.script.lock().unwrap();
        f(&mut script);
    }

    pub fn set_tracking_state(&self, state: TrackingState) {
        self.script(|s| s.tracking_state = state);
    }

    pub fn set_earth_state(&self, state: Option<EarthState>) {
        self.script(|s| s.earth_state = state);
    }

    /// Queue one result for the next `update` call
    pub fn push_update(&self, result: Result<(), EngineError>) {
        self.script(|s| s.update.push_back(result));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn live_handles(&self) -> Vec<EngineHandle> {
        self.live.lock().unwrap().clone()
    }

    /// Fire every held availability callback with `result`
    pub fn release_vps_callbacks(&self, result: Result<VpsAvailability, EngineError>) {
        let callbacks: Vec<_> = self.held_callbacks.lock().unwrap().drain(..).collect();
        for callback in callbacks {
            callback(result.clone());
        }
    }

    /// Drop held callbacks without calling them
    pub fn drop_vps_callbacks(&self) {
        self.held_callbacks.lock().unwrap().clear();
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn read<T>(&self, f: impl FnOnce(&Script) -> T) -> T {
        f(&self.script.lock().unwrap())
    }

    fn take_error(&self, f: impl FnOnce(&mut Script) -> Option<EngineError>) -> Result<(), EngineError> {
        let mut script = self.script.lock().unwrap();
        match f(&mut script) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl TrackingEngine for ScriptedEngine {
    fn check_availability(&self) -> EngineAvailability {
        self.record("check_availability");
        self.read(|s| s.availability)
    }

    fn request_install(&self, _user_requested: bool) -> Result<InstallStatus, EngineError> {
        self.record("request_install");
        self.script
            .lock()
            .unwrap()
            .install
            .pop_front()
            .unwrap_or(Ok(InstallStatus::Installed))
    }

    fn create_session(&self, _config: &SessionConfig) -> Result<EngineHandle, EngineError> {
        self.record("create_session");
        self.take_error(|s| s.create.clone())?;
        let handle = EngineHandle::new();
        self.live.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    fn is_geospatial_supported(&self, _handle: &EngineHandle) -> bool {
        self.record("is_geospatial_supported");
        self.read(|s| s.geospatial_supported)
    }

    fn configure(&self, _handle: &EngineHandle, _config: &GeoConfig) -> Result<(), EngineError> {
        self.record("configure");
        self.take_error(|s| s.configure.clone())
    }

    fn resume(&self, _handle: &EngineHandle) -> Result<(), EngineError> {
        self.record("resume");
        self.script
            .lock()
            .unwrap()
            .resume
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn pause(&self, _handle: &EngineHandle) -> Result<(), EngineError> {
        self.record("pause");
        self.take_error(|s| s.pause.clone())
    }

    fn close(&self, handle: &EngineHandle) -> Result<(), EngineError> {
        self.record("close");
        let result = self.take_error(|s| s.close.clone());
        if result.is_ok() || result.as_ref().is_err_and(EngineError::is_resource_gone) {
            self.live.lock().unwrap().retain(|h| h != handle);
        }
        result
    }

    fn update(&self, _handle: &EngineHandle) -> Result<(), EngineError> {
        self.record("update");
        self.script
            .lock()
            .unwrap()
            .update
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn earth_state(&self, _handle: &EngineHandle) -> Option<EarthState> {
        self.record("earth_state");
        self.read(|s| s.earth_state)
    }

    fn tracking_state(&self, _handle: &EngineHandle) -> TrackingState {
        self.record("tracking_state");
        self.read(|s| s.tracking_state)
    }

    fn camera_geospatial_pose(&self, _handle: &EngineHandle) -> GeospatialPose {
        self.record("camera_geospatial_pose");
        self.read(|s| s.pose)
    }

    fn check_vps_availability(
        &self,
        _handle: &EngineHandle,
        _latitude: f64,
        _longitude: f64,
        callback: AvailabilityCallback,
    ) {
        self.record("check_vps_availability");
        let (hold, result) = self.read(|s| (s.hold_vps_callbacks, s.vps.clone()));
        if hold {
            self.held_callbacks.lock().unwrap().push(callback);
        } else {
            callback(result);
        }
    }
}

/// A pose with distinct values in every field
pub fn test_pose() -> GeospatialPose {
    GeospatialPose {
        latitude: 48.858_37,
        longitude: 2.294_481,
        altitude: 35.25,
        orientation: [0.1, 0.7, -0.2, 0.675],
        vertical_accuracy: 1.5,
        horizontal_accuracy: 2.25,
        orientation_yaw_accuracy: 3.75,
    }
}
