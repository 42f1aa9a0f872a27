//! Session lifecycle commands
//!
//! [`SessionController`] owns the single engine session and its state
//! machine. It is a cheap handle: clones share the same session.
//!
//! ```text
//! NOT_SETUP ──setup_ar──► SETTING_UP ──► READY_TO_TRACK ──start_tracking──► PRETRACKING
//!                              │                ▲                               │
//!                              ▼                │ stop_tracking / tracking lost ▼
//!                  SETUP_FAILED | UNSUPPORTED   └─────────────────────────── TRACKING
//!
//! poll faults: CAMERA_UNAVAILABLE | EARTH_STATE_ERROR | FATAL_UPDATE_ERROR
//! close_ar: any ──► NOT_SETUP
//! ```

use std::sync::Arc;

use geovps_core::prelude::{debug, error, info, warn};
use geovps_core::{CloseError, OutdatedPackage, SessionEvent, SessionState, SetupError, StartError};
use geovps_engine::{
    EngineAvailability, EngineError, EngineHandle, InstallStatus, TrackingEngine,
};
use tokio::sync::watch;

use super::shared::{ControllerOptions, Shared};
use crate::config::Settings;
use crate::event_bus::{EventBus, Subscription};

/// Owner of the tracking session and its lifecycle state machine
pub struct SessionController<E: TrackingEngine> {
    pub(crate) shared: Arc<Shared<E>>,
}

impl<E: TrackingEngine> Clone for SessionController<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: TrackingEngine> std::fmt::Debug for SessionController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("polling", &self.is_polling())
            .finish()
    }
}

impl<E: TrackingEngine> SessionController<E> {
    pub fn new(engine: Arc<E>, settings: &Settings) -> Self {
        Self {
            shared: Arc::new(Shared::new(engine, settings)),
        }
    }

    /// Controller with default settings
    pub fn with_defaults(engine: Arc<E>) -> Self {
        Self::new(engine, &Settings::default())
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.shared.engine
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Register a callback for session events. See [`EventBus::subscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(callback)
    }

    /// Current lifecycle state. Never blocks.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Receiver that always holds the latest state
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.watch_state()
    }

    /// Whether a polling loop is registered and still running
    pub fn is_polling(&self) -> bool {
        self.shared.lock().polling_active()
    }

    /// Whether an engine session is currently held
    pub fn has_session(&self) -> bool {
        self.shared.lock().handle.is_some()
    }

    /// Create and configure the engine session.
    ///
    /// Returns `Ok(true)` once a session exists (immediately if one already
    /// does), `Ok(false)` when setup should be retried later: an install flow
    /// was started or the availability check has not finished.
    pub async fn setup_ar(&self) -> Result<bool, SetupError> {
        let _gate = self.shared.gate.lock().await;

        let install_prompted = {
            let mut core = self.shared.lock();
            if let Some(handle) = &core.handle {
                debug!("Setup skipped, {} already exists", handle);
                return Ok(true);
            }
            self.shared.commit(&mut core, SessionState::SettingUp);
            core.install_requested
        };

        let engine = Arc::clone(&self.shared.engine);
        let options = self.shared.options.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            establish(engine.as_ref(), &options, install_prompted)
        })
        .await
        .unwrap_or_else(|e| Err(SetupError::Fatal(format!("setup task failed: {e}"))));

        let mut core = self.shared.lock();
        match outcome {
            Ok(SetupOutcome::Ready(handle)) => {
                info!("Engine session {} ready", handle);
                core.handle = Some(handle);
                core.install_requested = false;
                self.shared.commit(&mut core, SessionState::ReadyToTrack);
                Ok(true)
            }
            Ok(SetupOutcome::InstallPending) => {
                info!("Engine install requested, setup must be retried once it completes");
                core.install_requested = true;
                self.shared.commit(&mut core, SessionState::NotSetup);
                Ok(false)
            }
            Ok(SetupOutcome::RetryLater) => {
                debug!("Engine availability not yet known, setup must be retried");
                self.shared.commit(&mut core, SessionState::NotSetup);
                Ok(false)
            }
            Err(err) => {
                warn!("Setup failed: {}", err);
                core.install_requested = false;
                self.shared.commit(&mut core, err.resulting_state());
                Err(err)
            }
        }
    }

    /// Resume the engine and begin polling.
    ///
    /// Only valid from `READY_TO_TRACK`. A resume failure leaves the state
    /// unchanged.
    pub async fn start_tracking(&self) -> Result<bool, StartError> {
        let _gate = self.shared.gate.lock().await;
        let mut core = self.shared.lock();

        let handle = core
            .handle
            .clone()
            .ok_or(StartError::SessionNotInitialized)?;

        let state = self.shared.state();
        if state != SessionState::ReadyToTrack {
            debug!("Start refused in state {}", state);
            return Err(StartError::SessionNotReady(state));
        }

        // Resume, commit and loop start form one critical section.
        self.shared.engine.resume(&handle).map_err(|e| {
            warn!("Failed to resume {}: {}", handle, e);
            StartError::from(e)
        })?;

        self.shared.commit(&mut core, SessionState::Pretracking);
        Shared::start_polling(&self.shared, &mut core);
        Ok(true)
    }

    /// Stop polling and pause the engine.
    ///
    /// Returns false without changing anything when no session exists. A
    /// pause failure is logged; the session still reports `READY_TO_TRACK`.
    pub fn stop_tracking(&self) -> bool {
        let mut core = self.shared.lock();

        let Some(handle) = core.handle.clone() else {
            debug!("Stop ignored, no session");
            return false;
        };

        core.stop_polling();
        if let Err(e) = self.shared.engine.pause(&handle) {
            warn!("Failed to pause {} while stopping: {}", handle, e);
        }
        self.shared.commit(&mut core, SessionState::ReadyToTrack);
        true
    }

    /// Stop polling, pause, and release the engine session.
    ///
    /// Closing without a session succeeds. If the pause fails the session is
    /// kept. If the release fails the session is kept too, unless the engine
    /// reports it already gone.
    pub async fn close_ar(&self) -> Result<bool, CloseError> {
        let _gate = self.shared.gate.lock().await;

        let handle = {
            let mut core = self.shared.lock();
            core.stop_polling();

            let Some(handle) = core.handle.clone() else {
                self.shared.commit(&mut core, SessionState::NotSetup);
                return Ok(true);
            };

            if let Err(e) = self.shared.engine.pause(&handle) {
                warn!("Failed to pause {} before close: {}", handle, e);
                return Err(CloseError::Pause(e.to_string()));
            }

            core.handle = None;
            handle
        };

        let engine = Arc::clone(&self.shared.engine);
        let closing = handle.clone();
        let closed = tokio::task::spawn_blocking(move || engine.close(&closing))
            .await
            .unwrap_or_else(|e| Err(EngineError::Internal(format!("close task failed: {e}"))));

        let mut core = self.shared.lock();
        match closed {
            Ok(()) => {
                info!("Closed engine session {}", handle);
                self.shared.commit(&mut core, SessionState::NotSetup);
                Ok(true)
            }
            Err(e) if e.is_resource_gone() => {
                warn!("Engine session {} was already released: {}", handle, e);
                self.shared.commit(&mut core, SessionState::NotSetup);
                Err(CloseError::Close(e.to_string()))
            }
            Err(e) => {
                error!("Failed to close {}: {}", handle, e);
                core.handle = Some(handle);
                // Paused above, so no longer tracking.
                if self.shared.state().is_tracking_requested() {
                    self.shared.commit(&mut core, SessionState::ReadyToTrack);
                }
                Err(CloseError::Close(e.to_string()))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────
// Session establishment (runs on a blocking worker)
// ─────────────────────────────────────────────────────────

#[derive(Debug)]
enum SetupOutcome {
    Ready(EngineHandle),
    /// The engine started an install flow
    InstallPending,
    /// Availability is still being determined
    RetryLater,
}

fn establish<E: TrackingEngine>(
    engine: &E,
    options: &ControllerOptions,
    install_prompted: bool,
) -> Result<SetupOutcome, SetupError> {
    let availability = engine.check_availability();
    debug!("Engine availability: {:?}", availability);

    if availability.is_transient() {
        return Ok(SetupOutcome::RetryLater);
    }

    if !availability.is_supported() {
        return Err(match availability {
            EngineAvailability::UnsupportedDeviceNotCapable => SetupError::EngineNotSupported,
            other => SetupError::Fatal(format!("availability check failed: {other:?}")),
        });
    }

    if availability.needs_install() {
        if !options.request_install {
            return Err(match availability {
                EngineAvailability::SupportedApkTooOld => {
                    SetupError::PackageTooOld(OutdatedPackage::Engine)
                }
                _ => SetupError::EngineNotInstalled,
            });
        }

        // Only the first request in an install cycle counts as user initiated.
        if engine.request_install(!install_prompted)? == InstallStatus::InstallRequested {
            return Ok(SetupOutcome::InstallPending);
        }
    }

    let handle = engine.create_session(&options.session)?;

    if !engine.is_geospatial_supported(&handle) {
        discard(engine, &handle);
        return Err(SetupError::GeospatialNotSupported);
    }

    if let Err(e) = engine.configure(&handle, &options.geo) {
        discard(engine, &handle);
        return Err(e.into());
    }

    Ok(SetupOutcome::Ready(handle))
}

/// Close a handle that never became the session
fn discard<E: TrackingEngine>(engine: &E, handle: &EngineHandle) {
    if let Err(e) = engine.close(handle) {
        warn!("Failed to close rejected session {}: {}", handle, e);
    }
}
