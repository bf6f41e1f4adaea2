use async_trait::async_trait;
use image::RgbImage;
use tracing::info;

use super::profile::CameraProfile;
use crate::config::CameraConfig;
use crate::error::Result;

/// Driver primitives for one physical camera. Handles are constructed once
/// at startup and live for the process lifetime; open/close happen at every
/// feed switch. Implementations decode into the caller's buffer, resizing
/// it to the opened profile's resolution when necessary.
#[async_trait]
pub trait VideoDevice: Send {
    fn name(&self) -> &str;
    fn is_open(&self) -> bool;

    /// Apply the profile's settings and open the device.
    async fn open(&mut self, profile: &CameraProfile) -> Result<()>;
    async fn start_capture(&mut self) -> Result<()>;
    async fn stop_capture(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;

    /// Block until the next frame and decode it into `frame`.
    async fn grab_frame(&mut self, frame: &mut RgbImage) -> Result<()>;
}

/// Construct the front and rear camera handles. A camera that fails to
/// construct (absent, busy) is logged and returned as None; the state
/// machine runs degraded without it.
pub fn open_system_devices(
    config: &CameraConfig,
) -> (Option<Box<dyn VideoDevice>>, Option<Box<dyn VideoDevice>>) {
    (
        construct_device("front camera", &config.front_device),
        construct_device("rear camera", &config.rear_device),
    )
}

#[cfg(all(target_os = "linux", feature = "camera"))]
fn construct_device(name: &str, device_path: &str) -> Option<Box<dyn VideoDevice>> {
    match super::gst::GstVideoDevice::new(name, device_path) {
        Ok(device) => {
            info!("Constructed {} on {}", name, device_path);
            Some(Box::new(device))
        }
        Err(e) => {
            tracing::warn!("Could not construct the {} on '{}': {}", name, device_path, e);
            None
        }
    }
}

#[cfg(not(all(target_os = "linux", feature = "camera")))]
fn construct_device(name: &str, device_path: &str) -> Option<Box<dyn VideoDevice>> {
    info!(
        "Hardware capture unavailable on this platform; using synthetic {} in place of '{}'",
        name, device_path
    );
    Some(Box::new(super::synthetic::SyntheticVideoDevice::new(name)))
}
