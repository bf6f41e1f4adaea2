use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::device::VideoDevice;
use super::mode::CameraMode;
use super::profile::CameraProfile;
use crate::config::{CameraConfig, StreamConfig};
use crate::error::{CameraError, Result};
use crate::frame::FramePool;
use crate::indicator::LoadingIndicator;
use crate::stream::VideoSink;
use crate::vision::ColorRange;

/// How long the hardware gets to settle after a switch before the first
/// real frame; transitional frames from the reconfigured sensor are broken.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);
const INDICATOR_POLL: Duration = Duration::from_millis(50);

/// Owns the two physical camera handles and the active feed mode, and
/// performs the full hardware reconfiguration when a new mode is applied.
/// The externally-written requested mode lives in an atomic cell sampled by
/// the loop at iteration boundaries.
pub struct CameraStateMachine {
    front: Option<Box<dyn VideoDevice>>,
    rear: Option<Box<dyn VideoDevice>>,
    front_on: bool,
    rear_on: bool,
    active: CameraMode,
    shared_active: Arc<AtomicU8>,
    requested: Arc<AtomicU8>,
    camera_config: CameraConfig,
    stream_quality: u8,
    color_range: Arc<RwLock<ColorRange>>,
    active_range: ColorRange,
    sink: Arc<dyn VideoSink>,
    indicator: Arc<dyn LoadingIndicator>,
}

impl CameraStateMachine {
    pub fn new(
        front: Option<Box<dyn VideoDevice>>,
        rear: Option<Box<dyn VideoDevice>>,
        camera_config: CameraConfig,
        stream_config: &StreamConfig,
        color_range: Arc<RwLock<ColorRange>>,
        sink: Arc<dyn VideoSink>,
        indicator: Arc<dyn LoadingIndicator>,
    ) -> Self {
        if front.is_none() && rear.is_none() {
            warn!("No cameras present; only the no-feed mode will produce video");
        }

        let active_range = *color_range.read();

        Self {
            front,
            rear,
            front_on: false,
            rear_on: false,
            active: CameraMode::NoFeed,
            shared_active: Arc::new(AtomicU8::new(CameraMode::NoFeed.as_u8())),
            requested: Arc::new(AtomicU8::new(CameraMode::NoFeed.as_u8())),
            camera_config,
            stream_quality: stream_config.quality,
            color_range,
            active_range,
            sink,
            indicator,
        }
    }

    pub fn active(&self) -> CameraMode {
        self.active
    }

    /// Cell the loop publishes the committed mode into, for readers outside
    /// the loop.
    pub fn active_handle(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.shared_active)
    }

    /// Cell external callers write mode requests into.
    pub fn requested_handle(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.requested)
    }

    /// The requested mode, when it differs from the active one. Sampled
    /// once per loop iteration; re-requesting the active mode is a no-op.
    pub fn pending_request(&self) -> Option<CameraMode> {
        let requested = CameraMode::from_u8(self.requested.load(Ordering::Acquire));
        (requested != self.active).then_some(requested)
    }

    /// The color range snapshotted at the last transition into the
    /// processed feed.
    pub fn active_color_range(&self) -> ColorRange {
        self.active_range
    }

    /// Apply a feed mode: reconfigure the hardware behind the loading
    /// overlay and commit the mode. Camera open failures degrade the mode
    /// instead of failing it; faults on the already-open capture path and
    /// collaborator failures propagate.
    pub async fn apply_mode(&mut self, target: CameraMode, pool: &mut FramePool) -> Result<()> {
        info!("Switching feed to {}...", target);
        self.sink.set_quality(self.stream_quality);
        self.indicator.start().await?;

        match target {
            CameraMode::ProcessedFront => {
                self.close_rear().await;
                self.open_front(target, pool).await?;
                self.active_range = *self.color_range.read();
                info!(
                    "Segmentation range: hue {:?}, saturation {:?}, value {:?}",
                    self.active_range.hue, self.active_range.saturation, self.active_range.value
                );
            }
            CameraMode::RawFront => {
                self.close_rear().await;
                self.open_front(target, pool).await?;
            }
            CameraMode::RawRear => {
                self.close_front().await;
                self.open_rear(target, pool).await?;
            }
            CameraMode::NoFeed => {
                self.close_front().await;
                self.close_rear().await;
            }
        }

        // Give the hardware a beat to settle; frames captured mid-switch
        // are discarded with it.
        tokio::time::sleep(SETTLE_DELAY).await;

        let shown_for = self.indicator.end().await?;
        debug!("Loading overlay shown for {:.2}s", shown_for);
        while self.indicator.running() {
            tokio::time::sleep(INDICATOR_POLL).await;
        }

        self.active = target;
        self.shared_active.store(target.as_u8(), Ordering::Release);
        info!("Feed switched to {}", target);
        Ok(())
    }

    pub async fn grab_front(&mut self, frame: &mut image::RgbImage) -> Result<()> {
        match self.front.as_mut() {
            Some(device) => device.grab_frame(frame).await,
            None => Err(CameraError::NotPresent {
                name: "front camera".to_string(),
            }
            .into()),
        }
    }

    pub async fn grab_rear(&mut self, frame: &mut image::RgbImage) -> Result<()> {
        match self.rear.as_mut() {
            Some(device) => device.grab_frame(frame).await,
            None => Err(CameraError::NotPresent {
                name: "rear camera".to_string(),
            }
            .into()),
        }
    }

    async fn open_front(&mut self, mode: CameraMode, pool: &mut FramePool) -> Result<()> {
        let Some(profile) = CameraProfile::for_mode(mode, &self.camera_config) else {
            return Ok(());
        };
        let Some(device) = self.front.as_mut() else {
            warn!("Front camera not present; switching without it");
            return Ok(());
        };

        self.front_on = open_device(device, &profile, &mut pool.front).await?;
        Ok(())
    }

    async fn open_rear(&mut self, mode: CameraMode, pool: &mut FramePool) -> Result<()> {
        let Some(profile) = CameraProfile::for_mode(mode, &self.camera_config) else {
            return Ok(());
        };
        let Some(device) = self.rear.as_mut() else {
            warn!("Rear camera not present; switching without it");
            return Ok(());
        };

        self.rear_on = open_device(device, &profile, &mut pool.rear).await?;
        Ok(())
    }

    async fn close_front(&mut self) {
        if let Some(device) = self.front.as_mut() {
            if self.front_on {
                close_device(device).await;
                self.front_on = false;
            }
        }
    }

    async fn close_rear(&mut self) {
        if let Some(device) = self.rear.as_mut() {
            if self.rear_on {
                close_device(device).await;
                self.rear_on = false;
            }
        }
    }
}

/// Configure, open and start one device, then pull a throwaway frame to
/// flush whatever the sensor produced during initialization. Open and start
/// failures leave the device closed and the mode degraded (Ok(false)); a
/// failed flush grab on a device that did open is a capture fault.
async fn open_device(
    device: &mut Box<dyn VideoDevice>,
    profile: &CameraProfile,
    scratch: &mut image::RgbImage,
) -> Result<bool> {
    if let Err(e) = device.open(profile).await {
        warn!("Could not open the {}: {}", device.name(), e);
        return Ok(false);
    }

    if let Err(e) = device.start_capture().await {
        warn!("Could not start capture on the {}: {}", device.name(), e);
        let _ = device.close().await;
        return Ok(false);
    }

    device.grab_frame(scratch).await?;
    Ok(true)
}

async fn close_device(device: &mut Box<dyn VideoDevice>) {
    if let Err(e) = device.stop_capture().await {
        warn!("Failed to stop capture on the {}: {}", device.name(), e);
    }
    if let Err(e) = device.close().await {
        warn!("Failed to close the {}: {}", device.name(), e);
    }
}
