pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod indicator;
pub mod runner;
pub mod service;
pub mod stream;
pub mod telemetry;
pub mod vision;

pub use camera::{
    open_system_devices, CameraMode, CameraProfile, CameraStateMachine, SyntheticVideoDevice,
    VideoDevice,
};
pub use config::GoalcamConfig;
pub use error::{CameraError, GoalcamError, Result, StreamError, VisionError};
pub use frame::{overlay_color, waiting_backdrop, FramePool};
pub use indicator::{LoadingIndicator, NullIndicator, SpinnerOverlay};
pub use runner::VisionLoop;
pub use service::VisionSystem;
#[cfg(feature = "streaming")]
pub use stream::MjpegStreamServer;
pub use stream::{NullVideoSink, VideoSink};
pub use telemetry::{LatestValueTelemetry, TelemetrySink};
pub use vision::{
    measure_particles, select_goal, threshold_hsv, ColorRange, GoalPosition, ParticleFeatures,
    GOAL_MIN_AREA, NO_GOAL,
};
