use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;

use super::profile::{PROCESSED_RESOLUTION, RAW_RESOLUTION};
use super::state_machine::CameraStateMachine;
use super::synthetic::{SyntheticDeviceState, SyntheticVideoDevice};
use super::{CameraMode, VideoDevice};
use crate::config::GoalcamConfig;
use crate::frame::FramePool;
use crate::indicator::NullIndicator;
use crate::stream::testutil::RecordingSink;
use crate::vision::ColorRange;

struct Fixture {
    machine: CameraStateMachine,
    pool: FramePool,
    front: Arc<SyntheticDeviceState>,
    rear: Arc<SyntheticDeviceState>,
    sink: Arc<RecordingSink>,
}

fn fixture() -> Fixture {
    fixture_with_devices(true, true)
}

fn fixture_with_devices(with_front: bool, with_rear: bool) -> Fixture {
    let config = GoalcamConfig::default();

    let front_device = SyntheticVideoDevice::new("front camera");
    let rear_device = SyntheticVideoDevice::new("rear camera");
    let front = front_device.state();
    let rear = rear_device.state();

    let sink = Arc::new(RecordingSink::new());
    let color_range = Arc::new(RwLock::new(
        ColorRange::from_config(&config.vision).unwrap(),
    ));

    let machine = CameraStateMachine::new(
        with_front.then(|| Box::new(front_device) as Box<dyn VideoDevice>),
        with_rear.then(|| Box::new(rear_device) as Box<dyn VideoDevice>),
        config.camera.clone(),
        &config.stream,
        color_range,
        sink.clone(),
        Arc::new(NullIndicator),
    );

    Fixture {
        machine,
        pool: FramePool::new(&config.system),
        front,
        rear,
        sink,
    }
}

#[tokio::test(start_paused = true)]
async fn test_transition_applies_mode_profile() {
    let mut fx = fixture();

    fx.machine
        .apply_mode(CameraMode::ProcessedFront, &mut fx.pool)
        .await
        .unwrap();

    assert_eq!(fx.machine.active(), CameraMode::ProcessedFront);
    assert!(fx.front.is_capturing());
    let profile = fx.front.last_profile().unwrap();
    assert_eq!(profile.resolution, PROCESSED_RESOLUTION);
    assert_eq!(
        profile.brightness,
        Some(GoalcamConfig::default().camera.processed_brightness)
    );
    // The throwaway grab flushed one frame at the new resolution.
    assert_eq!(fx.front.grab_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.pool.front.dimensions(), PROCESSED_RESOLUTION);
    // Quality was pushed to the sink at the start of the switch.
    assert_eq!(fx.sink.quality_settings.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transition_closes_the_unneeded_camera() {
    let mut fx = fixture();

    fx.machine
        .apply_mode(CameraMode::RawFront, &mut fx.pool)
        .await
        .unwrap();
    assert!(fx.front.is_capturing());
    assert!(!fx.rear.is_open());

    fx.machine
        .apply_mode(CameraMode::RawRear, &mut fx.pool)
        .await
        .unwrap();
    assert_eq!(fx.machine.active(), CameraMode::RawRear);
    assert!(!fx.front.is_open());
    assert_eq!(fx.front.close_calls.load(Ordering::SeqCst), 1);
    assert!(fx.rear.is_capturing());
    assert_eq!(fx.rear.last_profile().unwrap().resolution, RAW_RESOLUTION);
}

#[tokio::test(start_paused = true)]
async fn test_no_feed_closes_everything() {
    let mut fx = fixture();

    fx.machine
        .apply_mode(CameraMode::RawFront, &mut fx.pool)
        .await
        .unwrap();
    fx.machine
        .apply_mode(CameraMode::NoFeed, &mut fx.pool)
        .await
        .unwrap();

    assert_eq!(fx.machine.active(), CameraMode::NoFeed);
    assert!(!fx.front.is_open());
    assert!(!fx.rear.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_open_failure_degrades_instead_of_failing() {
    let mut fx = fixture();
    fx.front.fail_next_opens(1);

    fx.machine
        .apply_mode(CameraMode::RawFront, &mut fx.pool)
        .await
        .unwrap();

    // The mode committed, but the camera stayed closed and grabbing from
    // it faults.
    assert_eq!(fx.machine.active(), CameraMode::RawFront);
    assert!(!fx.front.is_capturing());
    assert!(fx.machine.grab_front(&mut fx.pool.front).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_absent_cameras_leave_no_feed_reachable() {
    let mut fx = fixture_with_devices(false, false);

    // Camera modes commit degraded; grabs fault.
    fx.machine
        .apply_mode(CameraMode::RawFront, &mut fx.pool)
        .await
        .unwrap();
    assert!(fx.machine.grab_front(&mut fx.pool.front).await.is_err());

    fx.machine
        .apply_mode(CameraMode::NoFeed, &mut fx.pool)
        .await
        .unwrap();
    assert_eq!(fx.machine.active(), CameraMode::NoFeed);
}

#[tokio::test(start_paused = true)]
async fn test_flush_grab_failure_propagates() {
    let mut fx = fixture();
    fx.front.fail_next_grabs(1);

    let result = fx
        .machine
        .apply_mode(CameraMode::RawFront, &mut fx.pool)
        .await;

    assert!(result.is_err());
    // The mode did not commit.
    assert_eq!(fx.machine.active(), CameraMode::NoFeed);
}

#[tokio::test(start_paused = true)]
async fn test_pending_request_is_none_for_active_mode() {
    let mut fx = fixture();
    let requested = fx.machine.requested_handle();

    requested.store(CameraMode::RawFront.as_u8(), Ordering::Release);
    assert_eq!(fx.machine.pending_request(), Some(CameraMode::RawFront));

    fx.machine
        .apply_mode(CameraMode::RawFront, &mut fx.pool)
        .await
        .unwrap();

    // Re-requesting the mode that is already active is a no-op.
    assert_eq!(fx.machine.pending_request(), None);
    requested.store(CameraMode::RawFront.as_u8(), Ordering::Release);
    assert_eq!(fx.machine.pending_request(), None);
}

#[tokio::test(start_paused = true)]
async fn test_color_range_snapshotted_on_processed_entry() {
    let config = GoalcamConfig::default();
    let color_range = Arc::new(RwLock::new(
        ColorRange::from_config(&config.vision).unwrap(),
    ));

    let front_device = SyntheticVideoDevice::new("front camera");
    let mut machine = CameraStateMachine::new(
        Some(Box::new(front_device)),
        None,
        config.camera.clone(),
        &config.stream,
        color_range.clone(),
        Arc::new(RecordingSink::new()),
        Arc::new(NullIndicator),
    );
    let mut pool = FramePool::new(&config.system);

    let updated = ColorRange {
        hue: (1, 2),
        saturation: (3, 4),
        value: (5, 6),
    };
    *color_range.write() = updated;

    // The running range is stale until the processed feed is entered.
    assert_ne!(machine.active_color_range(), updated);

    machine
        .apply_mode(CameraMode::ProcessedFront, &mut pool)
        .await
        .unwrap();
    assert_eq!(machine.active_color_range(), updated);
}
