//! Background polling loop that drives the engine while tracking is requested
//!
//! The loop is started by `start_tracking` and stopped by clearing its slot
//! in the [`SessionCore`]. Each tick runs entirely inside the exclusion
//! domain and first checks that its slot is still the registered one, so a
//! stopped loop never acts on the session again.
//!
//! **Tick rules**, in order:
//! 1. `update` fails with camera-unavailable → `CAMERA_UNAVAILABLE`, stop.
//! 2. `update` fails otherwise → `FATAL_UPDATE_ERROR`, stop.
//! 3. Geospatial capability absent or not enabled → `EARTH_STATE_ERROR`, stop.
//! 4. Engine tracking while `PRETRACKING` → `TRACKING`.
//! 5. Engine not tracking while `TRACKING` → `READY_TO_TRACK`.
//! 6. Handle cleared underneath the loop → `NOT_SETUP`, stop.
//!
//! After a fault the loop retires the handle (pause and close on a blocking
//! worker) under the command gate, unless a command already replaced it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use geovps_core::prelude::*;
use geovps_core::SessionState;
use geovps_engine::{EarthState, EngineHandle, TrackingEngine, TrackingState};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::shared::{PollerSlot, SessionCore, Shared};

/// What the loop should do after one tick
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    /// The slot was cleared or the session vanished
    Exit,
    /// A fault state was committed; the handle should be retired
    Fault(EngineHandle),
}

impl<E: TrackingEngine> Shared<E> {
    /// Start a polling loop unless one is already running for this session.
    ///
    /// Returns true if a new loop was spawned. Must be called from within a
    /// tokio runtime.
    pub(crate) fn start_polling(this: &Arc<Self>, core: &mut SessionCore) -> bool {
        if core.polling_active() {
            trace!("Polling loop already running");
            return false;
        }
        // A finished loop may have left its slot behind.
        core.stop_polling();

        let id = this.next_poller_id();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));

        spawn_polling_loop(
            Arc::downgrade(this),
            id,
            this.options.poll_interval,
            shutdown_rx,
            Arc::clone(&running),
        );
        core.poller = Some(PollerSlot::new(id, shutdown_tx, running));
        true
    }

    /// Run one tick of loop `id`
    pub(crate) fn poll_once(&self, id: u64) -> TickOutcome {
        let mut core = self.lock();

        let owned = core
            .poller
            .as_ref()
            .is_some_and(|slot| slot.id == id && slot.should_run());
        if !owned {
            return TickOutcome::Exit;
        }

        let Some(handle) = core.handle.clone() else {
            debug!("Polling loop {} lost its session", id);
            self.commit(&mut core, SessionState::NotSetup);
            core.stop_polling();
            return TickOutcome::Exit;
        };

        trace!("Poll tick {} on {}", id, handle);

        if let Err(err) = self.engine.update(&handle) {
            let next = if err.is_camera_unavailable() {
                SessionState::CameraUnavailable
            } else {
                SessionState::FatalUpdateError
            };
            warn!("Engine update failed on {}: {}", handle, err);
            self.events.diagnostic(format!("update failed: {err}"));
            return self.fault(&mut core, next, handle);
        }

        let earth = self.engine.earth_state(&handle);
        if earth != Some(EarthState::Enabled) {
            warn!("Geospatial capability unusable on {}: {:?}", handle, earth);
            self.events.diagnostic(format!("earth state: {earth:?}"));
            return self.fault(&mut core, SessionState::EarthStateError, handle);
        }

        let tracking = self.engine.tracking_state(&handle);
        if let Some(slot) = core.poller.as_mut() {
            if slot.last_tracking.replace(tracking) != Some(tracking) {
                self.events
                    .diagnostic(format!("tracking state: {tracking:?}"));
            }
        }

        match (self.state(), tracking) {
            (SessionState::Pretracking, TrackingState::Tracking) => {
                self.commit(&mut core, SessionState::Tracking);
            }
            (SessionState::Tracking, TrackingState::Paused | TrackingState::Stopped) => {
                info!("Tracking lost on {}", handle);
                self.commit(&mut core, SessionState::ReadyToTrack);
            }
            _ => {}
        }

        TickOutcome::Continue
    }

    fn fault(&self, core: &mut SessionCore, state: SessionState, handle: EngineHandle) -> TickOutcome {
        self.commit(core, state);
        core.stop_polling();
        TickOutcome::Fault(handle)
    }

    /// Release a handle left behind by a polling fault.
    ///
    /// Skipped when a command has since closed or replaced the handle, or
    /// moved the state out of the fault.
    pub(crate) async fn retire(&self, handle: EngineHandle) {
        let _gate = self.gate.lock().await;

        let taken = {
            let mut core = self.lock();
            if core.handle.as_ref() == Some(&handle) && self.state().is_fault() {
                core.handle.take()
            } else {
                None
            }
        };
        let Some(owned) = taken else {
            debug!("Faulted session {} already released", handle);
            return;
        };

        let engine = Arc::clone(&self.engine);
        let released = tokio::task::spawn_blocking(move || {
            if let Err(e) = engine.pause(&owned) {
                debug!("Pause before release failed on {}: {}", owned, e);
            }
            engine.close(&owned)
        })
        .await;

        match released {
            Ok(Ok(())) => info!("Released faulted session {}", handle),
            Ok(Err(e)) if e.is_resource_gone() => {
                debug!("Faulted session {} was already gone", handle)
            }
            Ok(Err(e)) => error!("Failed to release faulted session {}: {}", handle, e),
            Err(e) => error!("Release task for {} failed: {}", handle, e),
        }
    }
}

/// Spawn the polling task for loop `id`.
///
/// The loop runs until:
/// - the shutdown channel receives `true` or its sender is dropped,
/// - a tick finds its slot cleared or commits a fault, or
/// - the controller itself has been dropped.
fn spawn_polling_loop<E: TrackingEngine>(
    shared: Weak<Shared<E>>,
    id: u64,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    running: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Polling loop {} started ({:?} cadence)", id, interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(session) = shared.upgrade() else {
                        break;
                    };
                    match session.poll_once(id) {
                        TickOutcome::Continue => {}
                        TickOutcome::Exit => break,
                        TickOutcome::Fault(handle) => {
                            session.retire(handle).await;
                            break;
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        running.store(false, Ordering::Release);
        debug!("Polling loop {} exited", id);
    });
}
