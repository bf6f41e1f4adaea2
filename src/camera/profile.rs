use super::mode::CameraMode;
use crate::config::CameraConfig;
use crate::frame::{RAW_HEIGHT, RAW_WIDTH};

pub const CAMERA_FPS: u32 = 30;
pub const RAW_RESOLUTION: (u32, u32) = (RAW_WIDTH, RAW_HEIGHT);
/// The processed feed runs at quarter resolution to keep per-frame
/// segmentation inside the loop's frame budget.
pub const PROCESSED_RESOLUTION: (u32, u32) = (320, 240);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteBalance {
    Auto,
    /// Fixed indoor preset; keeps hue stable under arena lighting.
    FixedIndoor,
}

/// Hardware settings applied to a camera when a mode opens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraProfile {
    pub white_balance: WhiteBalance,
    /// None leaves the device's current brightness untouched.
    pub brightness: Option<i32>,
    pub fps: u32,
    pub resolution: (u32, u32),
}

impl CameraProfile {
    /// The profile a mode opens its camera with, or None for modes that
    /// need no camera.
    pub fn for_mode(mode: CameraMode, camera: &CameraConfig) -> Option<Self> {
        match mode {
            CameraMode::ProcessedFront => Some(Self {
                white_balance: WhiteBalance::FixedIndoor,
                brightness: Some(camera.processed_brightness),
                fps: CAMERA_FPS,
                resolution: PROCESSED_RESOLUTION,
            }),
            CameraMode::RawFront => Some(Self {
                white_balance: WhiteBalance::FixedIndoor,
                brightness: Some(0),
                fps: CAMERA_FPS,
                resolution: RAW_RESOLUTION,
            }),
            CameraMode::RawRear => Some(Self {
                white_balance: WhiteBalance::FixedIndoor,
                brightness: None,
                fps: CAMERA_FPS,
                resolution: RAW_RESOLUTION,
            }),
            CameraMode::NoFeed => None,
        }
    }
}
