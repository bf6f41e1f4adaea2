use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::device::VideoDevice;
use super::profile::CameraProfile;
use crate::error::{CameraError, Result};
use crate::frame::ensure_frame_size;

const FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Call counters and injection knobs shared between a synthetic device and
/// the code observing it. Everything is interior-mutable so observers keep
/// an `Arc` while the device itself is boxed away.
#[derive(Default)]
pub struct SyntheticDeviceState {
    pub open_calls: AtomicU64,
    pub start_calls: AtomicU64,
    pub stop_calls: AtomicU64,
    pub close_calls: AtomicU64,
    pub grab_calls: AtomicU64,
    open: AtomicBool,
    capturing: AtomicBool,
    injected_open_faults: AtomicU32,
    injected_grab_faults: AtomicU32,
    last_profile: Mutex<Option<CameraProfile>>,
    scripted_frame: Mutex<Option<RgbImage>>,
}

impl SyntheticDeviceState {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    pub fn last_profile(&self) -> Option<CameraProfile> {
        *self.last_profile.lock()
    }

    /// Make the next `count` open calls fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.injected_open_faults.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` grab calls fail.
    pub fn fail_next_grabs(&self, count: u32) {
        self.injected_grab_faults.store(count, Ordering::SeqCst);
    }

    /// Serve this frame from every grab instead of the generated pattern.
    pub fn set_scripted_frame(&self, frame: RgbImage) {
        *self.scripted_frame.lock() = Some(frame);
    }

    fn take_injected_fault(&self, counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Camera that renders a moving test pattern instead of touching hardware.
/// Serves as the capture backend on platforms without GStreamer and as the
/// test double for the state machine and loop.
pub struct SyntheticVideoDevice {
    name: String,
    state: Arc<SyntheticDeviceState>,
    frame_counter: u64,
}

impl SyntheticVideoDevice {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(SyntheticDeviceState::default()),
            frame_counter: 0,
        }
    }

    /// Observer handle onto this device's counters and injection knobs.
    pub fn state(&self) -> Arc<SyntheticDeviceState> {
        Arc::clone(&self.state)
    }

    fn render_pattern(&self, frame: &mut RgbImage, profile: &CameraProfile) {
        let (width, height) = profile.resolution;
        ensure_frame_size(frame, width, height);

        for px in frame.pixels_mut() {
            *px = Rgb([64, 64, 64]);
        }

        // A sweeping white column so consecutive frames differ.
        let column = (self.frame_counter % width as u64) as u32;
        for y in 0..height {
            frame.put_pixel(column, y, Rgb([230, 230, 230]));
        }
    }
}

#[async_trait]
impl VideoDevice for SyntheticVideoDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    async fn open(&mut self, profile: &CameraProfile) -> Result<()> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.take_injected_fault(&self.state.injected_open_faults) {
            return Err(CameraError::OpenFailed {
                name: self.name.clone(),
                details: "injected open fault".to_string(),
            }
            .into());
        }

        *self.state.last_profile.lock() = Some(*profile);
        self.state.open.store(true, Ordering::SeqCst);
        debug!("Synthetic {} opened with {:?}", self.name, profile);
        Ok(())
    }

    async fn start_capture(&mut self) -> Result<()> {
        self.state.start_calls.fetch_add(1, Ordering::SeqCst);

        if !self.state.is_open() {
            return Err(CameraError::NotCapturing {
                name: self.name.clone(),
            }
            .into());
        }

        self.state.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_capture(&mut self) -> Result<()> {
        self.state.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.state.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.open.store(false, Ordering::SeqCst);
        self.state.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn grab_frame(&mut self, frame: &mut RgbImage) -> Result<()> {
        self.state.grab_calls.fetch_add(1, Ordering::SeqCst);

        if !self.state.is_capturing() {
            return Err(CameraError::NotCapturing {
                name: self.name.clone(),
            }
            .into());
        }

        if self.state.take_injected_fault(&self.state.injected_grab_faults) {
            return Err(CameraError::CaptureFailed {
                name: self.name.clone(),
                details: "injected capture fault".to_string(),
            }
            .into());
        }

        // Pace like a real sensor delivering frames.
        tokio::time::sleep(FRAME_INTERVAL).await;

        let profile = self.state.last_profile().ok_or_else(|| CameraError::NotCapturing {
            name: self.name.clone(),
        })?;

        if let Some(scripted) = self.state.scripted_frame.lock().as_ref() {
            ensure_frame_size(frame, scripted.width(), scripted.height());
            frame.copy_from_slice(scripted.as_raw());
        } else {
            self.render_pattern(frame, &profile);
        }

        self.frame_counter += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraMode, CameraProfile};
    use crate::config::GoalcamConfig;

    fn raw_profile() -> CameraProfile {
        CameraProfile::for_mode(CameraMode::RawFront, &GoalcamConfig::default().camera).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_bookkeeping() {
        let mut device = SyntheticVideoDevice::new("front camera");
        let state = device.state();

        assert!(!device.is_open());
        device.open(&raw_profile()).await.unwrap();
        device.start_capture().await.unwrap();
        assert!(state.is_capturing());

        let mut frame = RgbImage::new(1, 1);
        device.grab_frame(&mut frame).await.unwrap();
        assert_eq!(frame.dimensions(), raw_profile().resolution);

        device.stop_capture().await.unwrap();
        device.close().await.unwrap();
        assert!(!device.is_open());

        assert_eq!(state.open_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.grab_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.last_profile(), Some(raw_profile()));
    }

    #[tokio::test]
    async fn test_grab_without_capture_fails() {
        let mut device = SyntheticVideoDevice::new("front camera");
        let mut frame = RgbImage::new(1, 1);
        assert!(device.grab_frame(&mut frame).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_faults_are_consumed() {
        let mut device = SyntheticVideoDevice::new("front camera");
        let state = device.state();

        state.fail_next_opens(1);
        assert!(device.open(&raw_profile()).await.is_err());
        device.open(&raw_profile()).await.unwrap();
        device.start_capture().await.unwrap();

        let mut frame = RgbImage::new(1, 1);
        state.fail_next_grabs(1);
        assert!(device.grab_frame(&mut frame).await.is_err());
        device.grab_frame(&mut frame).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_frame_served_verbatim() {
        let mut device = SyntheticVideoDevice::new("front camera");
        let state = device.state();

        let scripted = RgbImage::from_pixel(32, 24, Rgb([1, 2, 3]));
        state.set_scripted_frame(scripted.clone());

        device.open(&raw_profile()).await.unwrap();
        device.start_capture().await.unwrap();

        let mut frame = RgbImage::new(1, 1);
        device.grab_frame(&mut frame).await.unwrap();
        assert_eq!(frame, scripted);
    }
}
