//! Shared session state and the exclusion domain around it
//!
//! Everything that must change atomically (the engine handle, the poller
//! slot, the install flag, and the published state) lives behind one
//! `std::sync::Mutex`. The state itself is stored in a `watch` channel so
//! that reads never take the lock, but it is only ever written while the
//! lock is held: [`Shared::commit`] takes `&mut SessionCore` as proof.
//!
//! The lock is never held across an `.await`. Async commands additionally
//! hold the `gate` (a `tokio::sync::Mutex`) for their whole duration so that
//! setup, start, and close never interleave.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use geovps_core::prelude::*;
use geovps_core::{SessionEvent, SessionState};
use geovps_engine::{EngineHandle, GeoConfig, SessionConfig, TrackingEngine, TrackingState};
use tokio::sync::watch;

use crate::config::Settings;
use crate::event_bus::EventBus;

/// Engine-facing options resolved from [`Settings`]
#[derive(Debug, Clone)]
pub(crate) struct ControllerOptions {
    pub(crate) session: SessionConfig,
    pub(crate) geo: GeoConfig,
    pub(crate) request_install: bool,
    pub(crate) poll_interval: Duration,
}

impl From<&Settings> for ControllerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            session: settings.session.session_config(),
            geo: settings.session.geo_config(),
            request_install: settings.session.request_install,
            poll_interval: settings.polling.interval(),
        }
    }
}

/// Bookkeeping for the one polling task allowed per handle
#[derive(Debug)]
pub(crate) struct PollerSlot {
    pub(crate) id: u64,
    shutdown_tx: watch::Sender<bool>,
    running: Arc<AtomicBool>,
    /// Last tracking state seen by the loop, for diagnostics
    pub(crate) last_tracking: Option<TrackingState>,
}

impl PollerSlot {
    pub(crate) fn new(id: u64, shutdown_tx: watch::Sender<bool>, running: Arc<AtomicBool>) -> Self {
        Self {
            id,
            shutdown_tx,
            running,
            last_tracking: None,
        }
    }

    pub(crate) fn should_run(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn signal_stop(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Everything guarded by the exclusion domain
#[derive(Debug, Default)]
pub(crate) struct SessionCore {
    pub(crate) handle: Option<EngineHandle>,
    pub(crate) poller: Option<PollerSlot>,
    /// The engine has already been asked to install itself this cycle
    pub(crate) install_requested: bool,
}

impl SessionCore {
    /// Clear the poll signal. Returns true if a poller was registered.
    pub(crate) fn stop_polling(&mut self) -> bool {
        match self.poller.take() {
            Some(slot) => {
                slot.signal_stop();
                trace!("Polling loop {} signalled to stop", slot.id);
                true
            }
            None => false,
        }
    }

    pub(crate) fn polling_active(&self) -> bool {
        self.poller
            .as_ref()
            .is_some_and(|slot| slot.should_run() && slot.is_running())
    }
}

/// State shared by the controller, its clones, and the polling task
pub(crate) struct Shared<E: TrackingEngine> {
    pub(crate) engine: Arc<E>,
    pub(crate) options: ControllerOptions,
    pub(crate) events: EventBus,
    /// Serializes setup, start, and close
    pub(crate) gate: tokio::sync::Mutex<()>,
    core: Mutex<SessionCore>,
    state: watch::Sender<SessionState>,
    poller_ids: AtomicU64,
}

impl<E: TrackingEngine> Shared<E> {
    pub(crate) fn new(engine: Arc<E>, settings: &Settings) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            engine,
            options: ControllerOptions::from(settings),
            events: EventBus::new(settings.events.channel_capacity, settings.events.diagnostics),
            gate: tokio::sync::Mutex::new(()),
            core: Mutex::new(SessionCore::default()),
            state,
            poller_ids: AtomicU64::new(1),
        }
    }

    /// Enter the exclusion domain
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn next_poller_id(&self) -> u64 {
        self.poller_ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Write the state and publish the change. Writing the current value is
    /// a no-op and publishes nothing.
    pub(crate) fn commit(&self, _core: &mut SessionCore, next: SessionState) -> bool {
        let mut previous = next;
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            previous = std::mem::replace(current, next);
            true
        });

        if changed {
            info!("Session state: {} -> {}", previous, next);
            self.events
                .publish(SessionEvent::state_changed(previous, next));
        }
        changed
    }

    /// The handle queries may use: absent after a polling fault
    pub(crate) fn live_handle(&self, core: &SessionCore) -> Option<EngineHandle> {
        if self.state().is_fault() {
            return None;
        }
        core.handle.clone()
    }
}

impl<E: TrackingEngine> Drop for Shared<E> {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        core.stop_polling();
        if let Some(handle) = &core.handle {
            warn!(
                "Session controller dropped while {} is still open; call close_ar first",
                handle
            );
        }
    }
}
