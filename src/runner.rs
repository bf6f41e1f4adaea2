use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::camera::{CameraMode, CameraStateMachine};
use crate::error::Result;
use crate::frame::FramePool;
use crate::stream::VideoSink;
use crate::telemetry::{TelemetrySink, FPS_SAMPLE, PARTICLE_COUNT_SAMPLE};
use crate::vision::{measure_particles, threshold_hsv, ParticleFeatures, GOAL_MIN_AREA};

/// Fixed backoff after a recoverable fault. No frames are processed while
/// it runs; availability is traded for simplicity during faults.
pub const RECOVERY_BACKOFF: Duration = Duration::from_secs(2);
/// Pacing for the static no-feed frame, which would otherwise republish in
/// a hot spin.
const NO_FEED_FRAME_INTERVAL: Duration = Duration::from_millis(50);

const MARKER_SIZE: u32 = 4;

/// The continuously running driver: one iteration grabs a frame from the
/// active feed, runs the processing path for that mode, publishes the
/// display frame and the loop FPS, then applies any pending mode request.
pub struct VisionLoop {
    state: CameraStateMachine,
    pool: FramePool,
    sink: Arc<dyn VideoSink>,
    telemetry: Arc<dyn TelemetrySink>,
    particles_tx: watch::Sender<Arc<Vec<ParticleFeatures>>>,
    marker_color: Rgb<u8>,
    initial_mode: CameraMode,
}

impl VisionLoop {
    pub fn new(
        state: CameraStateMachine,
        pool: FramePool,
        sink: Arc<dyn VideoSink>,
        telemetry: Arc<dyn TelemetrySink>,
        particles_tx: watch::Sender<Arc<Vec<ParticleFeatures>>>,
        marker_color: Rgb<u8>,
        initial_mode: CameraMode,
    ) -> Self {
        Self {
            state,
            pool,
            sink,
            telemetry,
            particles_tx,
            marker_color,
            initial_mode,
        }
    }

    /// Drive iterations until cancelled or an irrecoverable fault stops the
    /// loop for good. There is no restart after termination.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Vision loop starting in {} mode", self.initial_mode);
        if let Err(e) = self
            .state
            .apply_mode(self.initial_mode, &mut self.pool)
            .await
        {
            error!("Initial feed switch failed; vision loop will not run: {}", e);
            return;
        }

        loop {
            if cancel.is_cancelled() {
                info!("Vision loop cancelled");
                break;
            }

            if let Err(e) = self.iterate().await {
                warn!("Recoverable fault in vision loop: {}", e);
                if !self.recover(&cancel).await {
                    break;
                }
            }
        }
    }

    async fn iterate(&mut self) -> Result<()> {
        let started = Instant::now();

        match self.state.active() {
            CameraMode::ProcessedFront => {
                self.state.grab_front(&mut self.pool.front).await?;
                self.process_front_frame()?;
            }
            CameraMode::RawFront => {
                self.state.grab_front(&mut self.pool.front).await?;
                self.sink.publish(&self.pool.front)?;
            }
            CameraMode::RawRear => {
                self.state.grab_rear(&mut self.pool.rear).await?;
                self.sink.publish(&self.pool.rear)?;
            }
            CameraMode::NoFeed => {
                self.sink.publish(&self.pool.no_signal)?;
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let fps = if elapsed_ms > 0.0 { 1000.0 / elapsed_ms } else { 0.0 };
        self.telemetry.record(FPS_SAMPLE, fps);

        if let Some(target) = self.state.pending_request() {
            self.state.apply_mode(target, &mut self.pool).await?;
        }

        if self.state.active() == CameraMode::NoFeed {
            tokio::time::sleep(NO_FEED_FRAME_INTERVAL).await;
        }

        Ok(())
    }

    /// The segmentation path: threshold, measure, publish the particle
    /// snapshot, then compose the display frame (masked color image plus a
    /// marker over every goal-sized particle).
    fn process_front_frame(&mut self) -> Result<()> {
        let range = self.state.active_color_range();
        threshold_hsv(&self.pool.front, &range, &mut self.pool.front_mask);

        let particles = measure_particles(&self.pool.front_mask);
        self.telemetry
            .record(PARTICLE_COUNT_SAMPLE, particles.len() as f64);

        let markers: Vec<(i32, i32)> = particles
            .iter()
            .filter(|p| p.convex_hull_area > GOAL_MIN_AREA)
            .map(|p| (p.centroid_x, p.centroid_y))
            .collect();

        // Replace the shared snapshot wholesale; readers never see a
        // partially measured frame.
        self.particles_tx.send_replace(Arc::new(particles));

        apply_mask(&mut self.pool.front, &self.pool.front_mask);
        let half = MARKER_SIZE as i32 / 2;
        for (cx, cy) in markers {
            draw_filled_rect_mut(
                &mut self.pool.front,
                Rect::at(cx - half, cy - half).of_size(MARKER_SIZE, MARKER_SIZE),
                self.marker_color,
            );
        }

        self.sink.publish(&self.pool.front)
    }

    /// Backoff-and-retry recovery: publish the no-signal frame, wait out
    /// the backoff, then force the raw front feed. Returns false when the
    /// recovery itself faults and the loop must terminate.
    async fn recover(&mut self, cancel: &CancellationToken) -> bool {
        if let Err(e) = self.sink.publish(&self.pool.no_signal) {
            error!("Irrecoverable fault in vision loop, stopping: {}", e);
            return false;
        }

        tokio::select! {
            _ = cancel.cancelled() => return true,
            _ = tokio::time::sleep(RECOVERY_BACKOFF) => {}
        }

        match self
            .state
            .apply_mode(CameraMode::RawFront, &mut self.pool)
            .await
        {
            Ok(()) => {
                info!("Recovered by forcing the raw front feed");
                true
            }
            Err(e) => {
                let _ = self.sink.publish(&self.pool.no_signal);
                error!("Irrecoverable fault in vision loop, stopping: {}", e);
                false
            }
        }
    }
}

/// Zero out every display pixel outside the binary mask.
fn apply_mask(frame: &mut RgbImage, mask: &GrayImage) {
    for (px, mask_px) in frame.pixels_mut().zip(mask.pixels()) {
        if mask_px.0[0] == 0 {
            *px = Rgb([0, 0, 0]);
        }
    }
}
