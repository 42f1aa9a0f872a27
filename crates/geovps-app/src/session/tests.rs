//! Controller tests against scripted and mocked engines

use std::sync::{Arc, Mutex};
use std::time::Duration;

use geovps_core::{
    AvailabilityError, CloseError, PoseError, SessionEvent, SessionState, SetupError, StartError,
    VpsAvailability,
};
use geovps_engine::test_utils::{test_pose, ScriptedEngine};
use geovps_engine::{
    EarthState, EngineAvailability, EngineError, EngineHandle, InstallStatus,
    MockTrackingEngine, TrackingState,
};
use mockall::predicate::eq;
use mockall::Sequence;
use tokio_test::{assert_err, assert_ok};

use super::SessionController;
use crate::config::Settings;
use crate::event_bus::Subscription;

const WAIT: Duration = Duration::from_secs(2);

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.polling.interval_ms = 10;
    settings
}

fn scripted() -> (Arc<ScriptedEngine>, SessionController<ScriptedEngine>) {
    let engine = Arc::new(ScriptedEngine::new());
    let controller = SessionController::new(Arc::clone(&engine), &fast_settings());
    (engine, controller)
}

/// Record the new state of every state-change event
fn record_states<E: geovps_engine::TrackingEngine>(
    controller: &SessionController<E>,
) -> (Subscription, Arc<Mutex<Vec<SessionState>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = controller.subscribe(move |event| {
        if let Some(state) = event.new_state() {
            sink.lock().unwrap().push(state);
        }
    });
    (sub, seen)
}

async fn wait_for_state<E: geovps_engine::TrackingEngine>(
    controller: &SessionController<E>,
    state: SessionState,
) {
    let mut rx = controller.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("state {} not reached, at {}", state, controller.state()))
        .unwrap();
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

/// Ready controller over an engine that reports tracking
async fn tracking() -> (Arc<ScriptedEngine>, SessionController<ScriptedEngine>) {
    let (engine, controller) = scripted();
    engine.set_tracking_state(TrackingState::Tracking);
    assert_ok!(controller.setup_ar().await);
    assert_ok!(controller.start_tracking().await);
    wait_for_state(&controller, SessionState::Tracking).await;
    (engine, controller)
}

// ─────────────────────────────────────────────────────────
// Lifecycle scenarios
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_happy_path_lifecycle() {
    let (engine, controller) = scripted();
    let (_sub, states) = record_states(&controller);

    assert!(assert_ok!(controller.setup_ar().await));
    assert_eq!(controller.state(), SessionState::ReadyToTrack);

    assert!(assert_ok!(controller.start_tracking().await));
    assert_eq!(controller.state(), SessionState::Pretracking);
    assert!(controller.is_polling());

    engine.set_tracking_state(TrackingState::Tracking);
    wait_for_state(&controller, SessionState::Tracking).await;

    let pose = assert_ok!(controller.camera_geospatial_pose());
    assert_eq!(pose, test_pose());

    assert!(controller.stop_tracking());
    assert_eq!(controller.state(), SessionState::ReadyToTrack);
    assert!(!controller.is_polling());

    assert!(assert_ok!(controller.close_ar().await));
    assert_eq!(controller.state(), SessionState::NotSetup);
    assert!(engine.live_handles().is_empty());

    assert_eq!(
        states.lock().unwrap().as_slice(),
        &[
            SessionState::SettingUp,
            SessionState::ReadyToTrack,
            SessionState::Pretracking,
            SessionState::Tracking,
            SessionState::ReadyToTrack,
            SessionState::NotSetup,
        ]
    );
}

#[tokio::test]
async fn test_start_before_setup_is_rejected() {
    let (engine, controller) = scripted();
    let (_sub, states) = record_states(&controller);

    let err = assert_err!(controller.start_tracking().await);

    assert_eq!(err, StartError::SessionNotInitialized);
    assert!(err.is_not_ready());
    assert_eq!(controller.state(), SessionState::NotSetup);
    assert!(states.lock().unwrap().is_empty());
    assert_eq!(engine.call_count("resume"), 0);
}

#[tokio::test]
async fn test_camera_unavailable_mid_poll() {
    let (engine, controller) = tracking().await;

    engine.push_update(Err(EngineError::CameraNotAvailable));
    wait_for_state(&controller, SessionState::CameraUnavailable).await;
    assert!(!controller.is_polling());

    // The faulted handle is released in the background.
    wait_until(|| engine.live_handles().is_empty()).await;
    assert_eq!(controller.state(), SessionState::CameraUnavailable);

    let updates = engine.call_count("update");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.call_count("update"), updates);

    assert_eq!(
        assert_err!(controller.camera_geospatial_pose()),
        PoseError::SessionNotInitialized
    );

    assert!(assert_ok!(controller.close_ar().await));
    assert_eq!(controller.state(), SessionState::NotSetup);
}

#[tokio::test]
async fn test_fatal_update_error_mid_poll() {
    let (engine, controller) = tracking().await;

    engine.push_update(Err(EngineError::Fatal("frame decode".into())));
    wait_for_state(&controller, SessionState::FatalUpdateError).await;

    assert_eq!(
        assert_err!(controller.check_vps_availability(1.0, 2.0).await),
        AvailabilityError::SessionNotInitialized
    );
    // Not ready while the handle is retired, not initialized afterwards.
    assert!(assert_err!(controller.start_tracking().await).is_not_ready());
}

#[tokio::test]
async fn test_earth_state_error_mid_poll() {
    let (engine, controller) = tracking().await;

    engine.set_earth_state(Some(EarthState::ErrorNotAuthorized));
    wait_for_state(&controller, SessionState::EarthStateError).await;
    assert!(!controller.is_polling());

    wait_until(|| !controller.has_session()).await;
    assert!(assert_ok!(controller.close_ar().await));
}

#[tokio::test]
async fn test_missing_earth_is_a_fault() {
    let (engine, controller) = tracking().await;

    engine.set_earth_state(None);
    wait_for_state(&controller, SessionState::EarthStateError).await;
}

#[tokio::test]
async fn test_tracking_lost_returns_to_ready() {
    let (engine, controller) = tracking().await;

    engine.set_tracking_state(TrackingState::Paused);
    wait_for_state(&controller, SessionState::ReadyToTrack).await;

    // The loop keeps running after losing tracking.
    assert!(controller.is_polling());
    assert_eq!(
        assert_err!(controller.camera_geospatial_pose()),
        PoseError::EarthNotTracking
    );
}

#[tokio::test]
async fn test_restart_after_tracking_lost_reuses_loop() {
    let (engine, controller) = tracking().await;
    let first_loop = controller.shared.lock().poller.as_ref().map(|p| p.id);

    engine.set_tracking_state(TrackingState::Paused);
    wait_for_state(&controller, SessionState::ReadyToTrack).await;

    assert_ok!(controller.start_tracking().await);
    assert_eq!(controller.state(), SessionState::Pretracking);
    assert_eq!(
        controller.shared.lock().poller.as_ref().map(|p| p.id),
        first_loop
    );
}

#[tokio::test]
async fn test_stop_and_start_replaces_loop() {
    let (_engine, controller) = tracking().await;
    let first_loop = controller.shared.lock().poller.as_ref().map(|p| p.id);

    assert!(controller.stop_tracking());
    assert_ok!(controller.start_tracking().await);

    let second_loop = controller.shared.lock().poller.as_ref().map(|p| p.id);
    assert!(second_loop.is_some());
    assert_ne!(second_loop, first_loop);
}

// ─────────────────────────────────────────────────────────
// Setup
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_setup_is_idempotent() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    let (_sub, states) = record_states(&controller);

    assert!(assert_ok!(controller.setup_ar().await));

    assert_eq!(engine.call_count("create_session"), 1);
    assert!(states.lock().unwrap().is_empty());
    assert_eq!(controller.state(), SessionState::ReadyToTrack);
}

#[tokio::test]
async fn test_concurrent_setups_create_one_session() {
    let (engine, controller) = scripted();

    let (a, b) = tokio::join!(controller.setup_ar(), controller.setup_ar());

    assert_eq!(a, Ok(true));
    assert_eq!(b, Ok(true));
    assert_eq!(engine.call_count("create_session"), 1);
}

#[tokio::test]
async fn test_setup_on_unsupported_device() {
    let (engine, controller) = scripted();
    engine.script(|s| s.availability = EngineAvailability::UnsupportedDeviceNotCapable);

    let err = assert_err!(controller.setup_ar().await);

    assert_eq!(err, SetupError::EngineNotSupported);
    assert_eq!(controller.state(), SessionState::Unsupported);
    assert_eq!(engine.call_count("create_session"), 0);
}

#[tokio::test]
async fn test_setup_while_availability_unknown() {
    let (engine, controller) = scripted();
    engine.script(|s| s.availability = EngineAvailability::UnknownChecking);
    let (_sub, states) = record_states(&controller);

    assert!(!assert_ok!(controller.setup_ar().await));

    assert_eq!(controller.state(), SessionState::NotSetup);
    assert_eq!(
        states.lock().unwrap().as_slice(),
        &[SessionState::SettingUp, SessionState::NotSetup]
    );
}

#[tokio::test]
async fn test_setup_availability_error_is_fatal() {
    let (engine, controller) = scripted();
    engine.script(|s| s.availability = EngineAvailability::UnknownError);

    assert!(matches!(
        assert_err!(controller.setup_ar().await),
        SetupError::Fatal(_)
    ));
    assert_eq!(controller.state(), SessionState::SetupFailed);
}

#[tokio::test]
async fn test_setup_install_requested_then_completed() {
    let mut engine = MockTrackingEngine::new();
    engine
        .expect_check_availability()
        .times(2)
        .return_const(EngineAvailability::SupportedNotInstalled);

    let mut seq = Sequence::new();
    engine
        .expect_request_install()
        .with(eq(true))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(InstallStatus::InstallRequested));
    engine
        .expect_request_install()
        .with(eq(false))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(InstallStatus::Installed));

    engine
        .expect_create_session()
        .times(1)
        .returning(|_| Ok(EngineHandle::new()));
    engine.expect_is_geospatial_supported().return_const(true);
    engine.expect_configure().returning(|_, _| Ok(()));

    let controller = SessionController::with_defaults(Arc::new(engine));

    assert!(!assert_ok!(controller.setup_ar().await));
    assert_eq!(controller.state(), SessionState::NotSetup);

    assert!(assert_ok!(controller.setup_ar().await));
    assert_eq!(controller.state(), SessionState::ReadyToTrack);
}

#[tokio::test]
async fn test_setup_install_declined() {
    let (engine, controller) = scripted();
    engine.script(|s| {
        s.availability = EngineAvailability::SupportedNotInstalled;
        s.install
            .push_back(Err(EngineError::UserDeclinedInstallation));
    });

    assert_eq!(
        assert_err!(controller.setup_ar().await),
        SetupError::InstallDeclined
    );
    assert_eq!(controller.state(), SessionState::SetupFailed);
}

#[tokio::test]
async fn test_setup_without_install_prompt() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script(|s| s.availability = EngineAvailability::SupportedApkTooOld);
    let mut settings = fast_settings();
    settings.session.request_install = false;
    let controller = SessionController::new(Arc::clone(&engine), &settings);

    assert_eq!(
        assert_err!(controller.setup_ar().await),
        SetupError::PackageTooOld(geovps_core::OutdatedPackage::Engine)
    );
    assert_eq!(engine.call_count("request_install"), 0);
}

#[tokio::test]
async fn test_setup_geospatial_not_supported() {
    let (engine, controller) = scripted();
    engine.script(|s| s.geospatial_supported = false);

    assert_eq!(
        assert_err!(controller.setup_ar().await),
        SetupError::GeospatialNotSupported
    );
    assert_eq!(controller.state(), SessionState::SetupFailed);
    assert!(!controller.has_session());
    // The rejected handle was closed, not leaked.
    assert!(engine.live_handles().is_empty());
}

#[tokio::test]
async fn test_setup_create_failure_maps_error() {
    let (engine, controller) = scripted();
    engine.script(|s| s.create = Some(EngineError::DeviceNotCompatible));

    assert_eq!(
        assert_err!(controller.setup_ar().await),
        SetupError::DeviceIncompatible
    );
    assert_eq!(controller.state(), SessionState::SetupFailed);
}

#[tokio::test]
async fn test_setup_after_failure_can_succeed() {
    let (engine, controller) = scripted();
    engine.script(|s| s.create = Some(EngineError::ContextUnavailable));
    assert_eq!(
        assert_err!(controller.setup_ar().await),
        SetupError::ContextUnavailable
    );

    engine.script(|s| s.create = None);
    assert!(assert_ok!(controller.setup_ar().await));
    assert_eq!(controller.state(), SessionState::ReadyToTrack);
}

// ─────────────────────────────────────────────────────────
// Start / stop
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_twice_is_not_ready() {
    let (_engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    assert_ok!(controller.start_tracking().await);

    let err = assert_err!(controller.start_tracking().await);

    assert_eq!(err, StartError::SessionNotReady(SessionState::Pretracking));
    assert!(err.is_not_ready());
    assert_eq!(controller.state(), SessionState::Pretracking);
}

#[tokio::test]
async fn test_start_rejected_outside_ready_to_track() {
    let mut cases = Vec::new();

    let (_engine, controller) = tracking().await;
    cases.push((
        controller,
        SessionState::Tracking,
        StartError::SessionNotReady(SessionState::Tracking),
    ));

    let (engine, controller) = scripted();
    engine.script(|s| s.availability = EngineAvailability::UnknownError);
    assert_err!(controller.setup_ar().await);
    cases.push((
        controller,
        SessionState::SetupFailed,
        StartError::SessionNotInitialized,
    ));

    let (engine, controller) = scripted();
    engine.script(|s| s.availability = EngineAvailability::UnsupportedDeviceNotCapable);
    assert_err!(controller.setup_ar().await);
    cases.push((
        controller,
        SessionState::Unsupported,
        StartError::SessionNotInitialized,
    ));

    // Faulted with the handle still held, as between the fault and its release.
    let (_engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    {
        let mut core = controller.shared.lock();
        controller
            .shared
            .commit(&mut core, SessionState::CameraUnavailable);
    }
    cases.push((
        controller,
        SessionState::CameraUnavailable,
        StartError::SessionNotReady(SessionState::CameraUnavailable),
    ));

    // Faulted and released.
    let (engine, controller) = tracking().await;
    engine.push_update(Err(EngineError::CameraNotAvailable));
    wait_for_state(&controller, SessionState::CameraUnavailable).await;
    wait_until(|| !controller.has_session()).await;
    cases.push((
        controller,
        SessionState::CameraUnavailable,
        StartError::SessionNotInitialized,
    ));

    for (controller, state, expected) in cases {
        assert_eq!(controller.state(), state);

        let err = assert_err!(controller.start_tracking().await);

        assert_eq!(err, expected, "start in {state}");
        assert!(err.is_not_ready());
        assert_eq!(controller.state(), state);
    }
}

#[tokio::test]
async fn test_resume_failure_leaves_state() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    engine.script(|s| s.resume.push_back(Err(EngineError::CameraNotAvailable)));

    assert_eq!(
        assert_err!(controller.start_tracking().await),
        StartError::CameraNotAvailable
    );
    assert_eq!(controller.state(), SessionState::ReadyToTrack);
    assert!(!controller.is_polling());

    // A later attempt can still succeed.
    assert!(assert_ok!(controller.start_tracking().await));
}

#[tokio::test]
async fn test_stop_without_session() {
    let (engine, controller) = scripted();
    let (_sub, states) = record_states(&controller);

    assert!(!controller.stop_tracking());

    assert!(states.lock().unwrap().is_empty());
    assert_eq!(engine.call_count("pause"), 0);
}

#[tokio::test]
async fn test_stop_when_pause_fails() {
    let (engine, controller) = tracking().await;
    engine.script(|s| s.pause = Some(EngineError::Internal("busy".into())));

    assert!(controller.stop_tracking());
    assert_eq!(controller.state(), SessionState::ReadyToTrack);
    assert!(!controller.is_polling());
}

#[tokio::test]
async fn test_stopped_loop_never_acts() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    assert_ok!(controller.start_tracking().await);
    wait_until(|| engine.call_count("update") > 0).await;

    assert!(controller.stop_tracking());
    engine.push_update(Err(EngineError::CameraNotAvailable));
    engine.set_tracking_state(TrackingState::Tracking);
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(controller.state(), SessionState::ReadyToTrack);
    assert!(controller.has_session());
}

#[tokio::test]
async fn test_steady_tracking_publishes_once() {
    let (engine, controller) = scripted();
    let (_sub, states) = record_states(&controller);
    engine.set_tracking_state(TrackingState::Tracking);
    assert_ok!(controller.setup_ar().await);
    assert_ok!(controller.start_tracking().await);
    wait_for_state(&controller, SessionState::Tracking).await;

    tokio::time::sleep(Duration::from_millis(60)).await;

    let tracking_events = states
        .lock()
        .unwrap()
        .iter()
        .filter(|s| **s == SessionState::Tracking)
        .count();
    assert_eq!(tracking_events, 1);
}

#[tokio::test(start_paused = true)]
async fn test_poll_cadence_follows_settings() {
    let engine = Arc::new(ScriptedEngine::new());
    let controller = SessionController::with_defaults(Arc::clone(&engine));
    assert_ok!(controller.setup_ar().await);
    assert_ok!(controller.start_tracking().await);

    tokio::time::sleep(Duration::from_millis(1000)).await;

    // First tick is immediate, then one every 100ms.
    let updates = engine.call_count("update");
    assert!((10..=11).contains(&updates), "updates = {updates}");
}

// ─────────────────────────────────────────────────────────
// Close
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_without_session() {
    let (engine, controller) = scripted();

    assert!(assert_ok!(controller.close_ar().await));
    assert_eq!(controller.state(), SessionState::NotSetup);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_close_twice_publishes_once() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    let (_sub, states) = record_states(&controller);

    assert!(assert_ok!(controller.close_ar().await));
    assert!(assert_ok!(controller.close_ar().await));

    assert_eq!(
        states.lock().unwrap().as_slice(),
        &[SessionState::NotSetup]
    );
    assert_eq!(engine.call_count("close"), 1);
    assert!(engine.live_handles().is_empty());
}

#[tokio::test]
async fn test_close_pauses_before_release() {
    let mut engine = MockTrackingEngine::new();
    engine
        .expect_check_availability()
        .return_const(EngineAvailability::SupportedInstalled);
    engine
        .expect_create_session()
        .returning(|_| Ok(EngineHandle::new()));
    engine.expect_is_geospatial_supported().return_const(true);
    engine.expect_configure().returning(|_, _| Ok(()));

    let mut seq = Sequence::new();
    engine
        .expect_pause()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    engine
        .expect_close()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let controller = SessionController::with_defaults(Arc::new(engine));
    assert_ok!(controller.setup_ar().await);

    assert!(assert_ok!(controller.close_ar().await));
    assert!(!controller.has_session());
}

#[tokio::test]
async fn test_close_pause_failure_keeps_session() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    engine.script(|s| s.pause = Some(EngineError::IllegalState("recording".into())));

    assert!(matches!(
        assert_err!(controller.close_ar().await),
        CloseError::Pause(_)
    ));
    assert!(controller.has_session());
    assert_eq!(controller.state(), SessionState::ReadyToTrack);
    assert_eq!(engine.call_count("close"), 0);
}

#[tokio::test]
async fn test_close_failure_keeps_session() {
    let (engine, controller) = tracking().await;
    engine.script(|s| s.close = Some(EngineError::Internal("busy".into())));

    assert!(matches!(
        assert_err!(controller.close_ar().await),
        CloseError::Close(_)
    ));
    assert!(controller.has_session());
    assert!(!controller.is_polling());
    assert_eq!(controller.state(), SessionState::ReadyToTrack);

    engine.script(|s| s.close = None);
    assert!(assert_ok!(controller.close_ar().await));
}

#[tokio::test]
async fn test_close_of_released_session_clears_it() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    engine.script(|s| s.close = Some(EngineError::SessionGone));

    assert!(matches!(
        assert_err!(controller.close_ar().await),
        CloseError::Close(_)
    ));
    assert!(!controller.has_session());
    assert_eq!(controller.state(), SessionState::NotSetup);
}

// ─────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pose_without_session() {
    let (_engine, controller) = scripted();
    assert_eq!(
        assert_err!(controller.camera_geospatial_pose()),
        PoseError::SessionNotInitialized
    );
}

#[tokio::test]
async fn test_pose_before_localized() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);

    assert_eq!(
        assert_err!(controller.camera_geospatial_pose()),
        PoseError::EarthNotTracking
    );

    engine.set_earth_state(None);
    assert_eq!(
        assert_err!(controller.camera_geospatial_pose()),
        PoseError::EarthNotAvailable
    );
}

#[tokio::test]
async fn test_availability_results_pass_through() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);

    assert_eq!(
        controller.check_vps_availability(37.0, -122.0).await,
        Ok(VpsAvailability::Available)
    );

    engine.script(|s| s.vps = Err(EngineError::Network));
    assert_eq!(
        assert_err!(controller.check_vps_availability(37.0, -122.0).await),
        AvailabilityError::NetworkConnection
    );
}

#[tokio::test]
async fn test_availability_without_session() {
    let (engine, controller) = scripted();

    assert_eq!(
        assert_err!(controller.check_vps_availability(0.0, 0.0).await),
        AvailabilityError::SessionNotInitialized
    );
    assert_eq!(engine.call_count("check_vps_availability"), 0);
}

#[tokio::test]
async fn test_availability_callback_dropped() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    engine.script(|s| s.hold_vps_callbacks = true);

    let query = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.check_vps_availability(1.0, 1.0).await })
    };
    wait_until(|| engine.call_count("check_vps_availability") == 1).await;
    engine.drop_vps_callbacks();

    assert!(matches!(
        query.await.unwrap(),
        Err(AvailabilityError::Internal(_))
    ));
}

#[tokio::test]
async fn test_pending_availability_does_not_block_commands() {
    let (engine, controller) = tracking().await;
    engine.script(|s| s.hold_vps_callbacks = true);

    let query = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.check_vps_availability(48.85, 2.29).await })
    };
    wait_until(|| engine.call_count("check_vps_availability") == 1).await;

    assert!(controller.stop_tracking());
    assert_eq!(controller.state(), SessionState::ReadyToTrack);

    engine.release_vps_callbacks(Ok(VpsAvailability::Unavailable));
    assert_eq!(query.await.unwrap(), Ok(VpsAvailability::Unavailable));
}

// ─────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_diagnostics_published_when_enabled() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.set_tracking_state(TrackingState::Tracking);
    let mut settings = fast_settings();
    settings.events.diagnostics = true;
    let controller = SessionController::new(Arc::clone(&engine), &settings);

    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    let _sub = controller.subscribe(move |event| {
        if let SessionEvent::Diagnostic { message } = event {
            sink.lock().unwrap().push(message.clone());
        }
    });

    assert_ok!(controller.setup_ar().await);
    assert_ok!(controller.start_tracking().await);
    wait_for_state(&controller, SessionState::Tracking).await;

    assert!(messages
        .lock()
        .unwrap()
        .iter()
        .any(|m| m == "tracking state: Tracking"));
}

#[tokio::test]
async fn test_event_stream_sees_transitions() {
    let (_engine, controller) = scripted();
    let mut rx = controller.events().stream();

    assert_ok!(controller.setup_ar().await);

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.new_state(), Some(SessionState::SettingUp));
    assert_eq!(second.new_state(), Some(SessionState::ReadyToTrack));
}

#[tokio::test]
async fn test_callback_can_read_state() {
    let (_engine, controller) = scripted();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let reader = controller.clone();
    let _sub = controller.subscribe(move |_| {
        sink.lock().unwrap().push(reader.state());
    });

    assert_ok!(controller.setup_ar().await);

    assert_eq!(
        observed.lock().unwrap().as_slice(),
        &[SessionState::SettingUp, SessionState::ReadyToTrack]
    );
}

#[tokio::test]
async fn test_dropping_controller_stops_polling() {
    let (engine, controller) = scripted();
    assert_ok!(controller.setup_ar().await);
    assert_ok!(controller.start_tracking().await);
    wait_until(|| engine.call_count("update") > 0).await;

    drop(controller);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let updates = engine.call_count("update");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.call_count("update"), updates);
}
