//! Headless runner - drives one session and reports it as NDJSON
//!
//! `run_session` performs the full lifecycle: setup (retrying while the
//! engine asks to be asked again), start, periodic pose sampling, an
//! optional availability query, stop, and close. Every session event is
//! forwarded to stdout as it is published.

use std::time::Duration;

use geovps_app::VpsSession;
use geovps_core::prelude::*;
use geovps_core::{PoseError, SessionEvent, SessionState, SetupError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::HeadlessEvent;

/// How many times `setup_ar` is retried while it answers "not yet"
pub const SETUP_ATTEMPTS: u32 = 10;

/// Delay between setup attempts
pub const SETUP_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Shortest pose sampling interval
pub const MIN_POSE_INTERVAL: Duration = Duration::from_millis(1);

/// Parameters of a headless run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// How long to keep tracking before shutting down
    pub duration: Duration,
    /// How often to sample the camera pose, at least [`MIN_POSE_INTERVAL`]
    pub pose_interval: Duration,
    /// Coordinate to query for VPS coverage once tracking has started
    pub check_at: Option<(f64, f64)>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            pose_interval: Duration::from_secs(1),
            check_at: None,
        }
    }
}

/// Run a full session lifecycle. Returns the state the session ended in.
pub async fn run_session<S: VpsSession + Sync>(session: &S, options: &RunOptions) -> Result<SessionState> {
    info!("═══════════════════════════════════════════════════════");
    info!("GeoVPS headless run ({:?})", options.duration);
    info!("═══════════════════════════════════════════════════════");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let forwarder = spawn_event_forwarder(session.events().stream(), shutdown_rx);
    let result = drive(session, options).await;

    // Close regardless of how the run went.
    if let Err(e) = session.close_ar().await {
        warn!("Close failed: {}", e);
        HeadlessEvent::error("close_ar", e.code(), e.to_string(), false).emit();
    }

    let final_state = session.vps_state();
    shutdown_tx.send_replace(true);
    if let Err(e) = forwarder.await {
        debug!("Event forwarder ended abnormally: {}", e);
    }
    HeadlessEvent::completed(final_state).emit();

    info!("GeoVPS headless run finished in {}", final_state);
    result.map(|()| final_state)
}

async fn drive<S: VpsSession + Sync>(session: &S, options: &RunOptions) -> Result<()> {
    setup_with_retry(session).await?;

    if let Err(e) = session.start_tracking().await {
        HeadlessEvent::error("start_tracking", e.code(), e.to_string(), !e.is_recoverable())
            .emit();
        return Err(e.into());
    }

    if let Some((latitude, longitude)) = options.check_at {
        report_availability(session, latitude, longitude).await;
    }

    let deadline = tokio::time::sleep(options.duration);
    tokio::pin!(deadline);
    let mut pose_tick = tokio::time::interval(options.pose_interval.max(MIN_POSE_INTERVAL));

    loop {
        tokio::select! {
            _ = &mut deadline => {
                debug!("Run duration elapsed");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = pose_tick.tick() => {
                let state = session.vps_state();
                if state.is_fault() {
                    warn!("Session faulted: {}", state);
                    HeadlessEvent::error("polling", state.as_str(), "tracking session faulted", true)
                        .emit();
                    break;
                }
                sample_pose(session);
            }
        }
    }

    session.stop_tracking();
    Ok(())
}

/// Set up the session, retrying while the engine reports "not yet"
pub async fn setup_with_retry<S: VpsSession + Sync>(session: &S) -> Result<()> {
    for attempt in 1..=SETUP_ATTEMPTS {
        match session.setup_ar().await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                debug!("Setup attempt {} deferred, retrying", attempt);
                tokio::time::sleep(SETUP_RETRY_DELAY).await;
            }
            Err(e) => {
                error!("Setup failed: {}", e);
                HeadlessEvent::error("setup_ar", e.code(), e.to_string(), true).emit();
                return Err(e.into());
            }
        }
    }

    HeadlessEvent::error(
        "setup_ar",
        "E_SETUP_TIMEOUT",
        format!("engine not ready after {SETUP_ATTEMPTS} attempts"),
        true,
    )
    .emit();
    Err(SetupError::Fatal("engine did not become available".to_string()).into())
}

/// Query coverage at a coordinate and emit the answer
pub async fn report_availability<S: VpsSession + Sync>(
    session: &S,
    latitude: f64,
    longitude: f64,
) -> bool {
    match session.check_vps_availability(latitude, longitude).await {
        Ok(availability) => {
            info!("VPS at ({}, {}): {}", latitude, longitude, availability);
            HeadlessEvent::availability(latitude, longitude, availability).emit();
            true
        }
        Err(e) => {
            warn!("VPS availability query failed: {}", e);
            HeadlessEvent::error("check_vps_availability", e.code(), e.to_string(), false).emit();
            false
        }
    }
}

fn sample_pose<S: VpsSession>(session: &S) {
    match session.camera_geospatial_pose() {
        Ok(pose) => HeadlessEvent::pose(pose).emit(),
        Err(PoseError::EarthNotTracking) => trace!("Pose not yet available"),
        Err(e) => debug!("Pose query failed: {}", e),
    }
}

/// Forward published session events to stdout.
///
/// On shutdown, events already published are drained before exiting.
fn spawn_event_forwarder(
    mut rx: broadcast::Receiver<SessionEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => HeadlessEvent::from(&event).emit(),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Headless output lagged, {} events dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown_rx.changed() => {
                    while let Ok(event) = rx.try_recv() {
                        HeadlessEvent::from(&event).emit();
                    }
                    break;
                }
            }
        }
    })
}
