use image::Rgb;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::camera::{CameraMode, CameraStateMachine, VideoDevice};
use crate::config::GoalcamConfig;
use crate::error::Result;
use crate::frame::FramePool;
use crate::indicator::LoadingIndicator;
use crate::runner::VisionLoop;
use crate::stream::VideoSink;
use crate::telemetry::TelemetrySink;
use crate::vision::{select_goal, ColorRange, GoalPosition, ParticleFeatures, GOAL_MIN_AREA};

/// Handle on the running vision subsystem. Constructed once at startup by
/// the owning process; construction failure leaves the owner with an
/// explicit error instead of a half-built subsystem. The loop it spawns
/// runs until shutdown or an irrecoverable fault; there is no restart.
pub struct VisionSystem {
    requested: Arc<AtomicU8>,
    active: Arc<AtomicU8>,
    controllable: AtomicBool,
    color_range: Arc<RwLock<ColorRange>>,
    particles: watch::Receiver<Arc<Vec<ParticleFeatures>>>,
    cancel: CancellationToken,
    loop_task: tokio::task::JoinHandle<()>,
}

impl VisionSystem {
    /// Validate configuration, build the frame pool and state machine, and
    /// start the vision loop exactly once.
    pub fn start(
        config: &GoalcamConfig,
        front: Option<Box<dyn VideoDevice>>,
        rear: Option<Box<dyn VideoDevice>>,
        sink: Arc<dyn VideoSink>,
        telemetry: Arc<dyn TelemetrySink>,
        indicator: Arc<dyn LoadingIndicator>,
    ) -> Result<Self> {
        config.validate().map_err(crate::error::GoalcamError::Config)?;
        let color_range = Arc::new(RwLock::new(ColorRange::from_config(&config.vision)?));

        let pool = FramePool::new(&config.system);
        let state = CameraStateMachine::new(
            front,
            rear,
            config.camera.clone(),
            &config.stream,
            Arc::clone(&color_range),
            Arc::clone(&sink),
            indicator,
        );

        let requested = state.requested_handle();
        let active = state.active_handle();
        requested.store(config.system.initial_mode.as_u8(), Ordering::Release);

        let (particles_tx, particles) = watch::channel(Arc::new(Vec::new()));
        let (r, g, b) = config.vision.marker_color;

        let vision_loop = VisionLoop::new(
            state,
            pool,
            sink,
            telemetry,
            particles_tx,
            Rgb([r, g, b]),
            config.system.initial_mode,
        );

        let cancel = CancellationToken::new();
        let loop_task = tokio::spawn(vision_loop.run(cancel.clone()));

        info!("Vision subsystem started");
        Ok(Self {
            requested,
            active,
            controllable: AtomicBool::new(true),
            color_range,
            particles,
            cancel,
            loop_task,
        })
    }

    /// Request a feed switch. Takes effect at the next loop iteration
    /// boundary; requesting the active mode is a no-op.
    pub fn switch_cam(&self, mode: CameraMode) {
        self.requested.store(mode.as_u8(), Ordering::Release);
    }

    pub fn active_mode(&self) -> CameraMode {
        CameraMode::from_u8(self.active.load(Ordering::Acquire))
    }

    /// True iff the segmentation pipeline is running.
    pub fn is_processing_camera(&self) -> bool {
        self.active_mode().is_processed()
    }

    /// Whether an external controller may drive feed switches. Policy flag
    /// only; enforcement is the caller's responsibility.
    pub fn is_controllable(&self) -> bool {
        self.controllable.load(Ordering::Relaxed)
    }

    pub fn set_controllable(&self, controllable: bool) {
        self.controllable.store(controllable, Ordering::Relaxed);
    }

    /// The goal position from the latest particle snapshot, or (-1, -1)
    /// when nothing goal-sized is in view.
    pub fn goal_xy(&self) -> GoalPosition {
        select_goal(&self.particles.borrow(), GOAL_MIN_AREA)
    }

    /// Update the segmentation color range. Read by the loop at its next
    /// transition into the processed feed.
    pub fn set_color_range(&self, range: ColorRange) {
        *self.color_range.write() = range;
    }

    pub fn color_range(&self) -> ColorRange {
        *self.color_range.read()
    }

    /// Cancel the loop and wait for it to wind down.
    pub async fn shutdown(self) {
        info!("Shutting down vision subsystem");
        self.cancel.cancel();
        let _ = self.loop_task.await;
    }
}
