mod device;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod gst;
mod mode;
mod profile;
mod state_machine;
mod synthetic;
#[cfg(test)]
mod tests;

pub use device::{open_system_devices, VideoDevice};
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use gst::GstVideoDevice;
pub use mode::CameraMode;
pub use profile::{CameraProfile, WhiteBalance, CAMERA_FPS, PROCESSED_RESOLUTION, RAW_RESOLUTION};
pub use state_machine::{CameraStateMachine, SETTLE_DELAY};
pub use synthetic::{SyntheticDeviceState, SyntheticVideoDevice};
