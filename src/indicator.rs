use async_trait::async_trait;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_ellipse_mut;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;
use crate::stream::VideoSink;

const SPIN_INTERVAL: Duration = Duration::from_millis(100);

/// Loading overlay shown while a feed switch is in progress. It runs on its
/// own schedule between `start` and `end`; `running` reports whether the
/// animation is still draining after `end`.
#[async_trait]
pub trait LoadingIndicator: Send + Sync {
    async fn start(&self) -> Result<()>;
    /// Signal the animation to stop. Returns elapsed seconds since `start`.
    async fn end(&self) -> Result<f64>;
    fn running(&self) -> bool;
}

/// Indicator that shows nothing. Used headless and in tests.
pub struct NullIndicator;

#[async_trait]
impl LoadingIndicator for NullIndicator {
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn end(&self) -> Result<f64> {
        Ok(0.0)
    }

    fn running(&self) -> bool {
        false
    }
}

struct SpinnerTask {
    stop: Arc<AtomicBool>,
    started: Instant,
    handle: tokio::task::JoinHandle<()>,
}

/// Animates an orbiting dot over the waiting backdrop and publishes each
/// tick to the video sink.
pub struct SpinnerOverlay {
    sink: Arc<dyn VideoSink>,
    backdrop: RgbImage,
    task: Mutex<Option<SpinnerTask>>,
}

impl SpinnerOverlay {
    pub fn new(sink: Arc<dyn VideoSink>, backdrop: RgbImage) -> Self {
        Self {
            sink,
            backdrop,
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl LoadingIndicator for SpinnerOverlay {
    async fn start(&self) -> Result<()> {
        let mut slot = self.task.lock();
        if slot.is_some() {
            debug!("Loading overlay already running");
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let sink = Arc::clone(&self.sink);
        let backdrop = self.backdrop.clone();

        let handle = tokio::spawn(async move {
            let (cx, cy) = (
                backdrop.width() as f32 / 2.0,
                backdrop.height() as f32 * 0.75,
            );
            let mut tick = 0u32;

            while !stop_flag.load(Ordering::Relaxed) {
                let mut frame = backdrop.clone();
                let angle = tick as f32 * 0.6;
                let x = cx + 40.0 * angle.cos();
                let y = cy + 40.0 * angle.sin();
                draw_filled_ellipse_mut(
                    &mut frame,
                    (x as i32, y as i32),
                    6,
                    6,
                    Rgb([220, 220, 220]),
                );

                if sink.publish(&frame).is_err() {
                    break;
                }

                tick += 1;
                tokio::time::sleep(SPIN_INTERVAL).await;
            }
        });

        *slot = Some(SpinnerTask {
            stop,
            started: Instant::now(),
            handle,
        });
        Ok(())
    }

    async fn end(&self) -> Result<f64> {
        let slot = self.task.lock();
        match slot.as_ref() {
            Some(task) => {
                task.stop.store(true, Ordering::Relaxed);
                Ok(task.started.elapsed().as_secs_f64())
            }
            None => Ok(0.0),
        }
    }

    fn running(&self) -> bool {
        let mut slot = self.task.lock();
        match slot.as_ref() {
            Some(task) if task.handle.is_finished() => {
                *slot = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::testutil::RecordingSink;

    #[tokio::test(start_paused = true)]
    async fn test_spinner_publishes_and_drains() {
        let sink = Arc::new(RecordingSink::new());
        let spinner = SpinnerOverlay::new(
            sink.clone(),
            RgbImage::from_pixel(64, 48, Rgb([10, 16, 40])),
        );

        spinner.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(spinner.running());

        let elapsed = spinner.end().await.unwrap();
        assert!(elapsed > 0.0);

        while spinner.running() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert!(sink.published() >= 3);
    }

    #[tokio::test]
    async fn test_end_without_start_is_a_noop() {
        let sink = Arc::new(RecordingSink::new());
        let spinner = SpinnerOverlay::new(sink, RgbImage::new(8, 8));

        assert!(!spinner.running());
        assert_eq!(spinner.end().await.unwrap(), 0.0);
    }
}
