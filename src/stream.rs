use image::RgbImage;

use crate::error::Result;

/// Video publishing service: one display frame per call plus a quality
/// setting pushed at every feed switch.
pub trait VideoSink: Send + Sync {
    fn publish(&self, frame: &RgbImage) -> Result<()>;
    fn set_quality(&self, quality: u8);
}

/// Sink that discards every frame. Used headless and in tests that don't
/// care about published output.
pub struct NullVideoSink;

impl VideoSink for NullVideoSink {
    fn publish(&self, _frame: &RgbImage) -> Result<()> {
        Ok(())
    }

    fn set_quality(&self, _quality: u8) {}
}

#[cfg(feature = "streaming")]
pub use server::MjpegStreamServer;

#[cfg(feature = "streaming")]
mod server {
    use super::VideoSink;
    use crate::config::StreamConfig;
    use crate::error::{Result, StreamError};
    use crate::telemetry::LatestValueTelemetry;
    use axum::{
        extract::State,
        http::{header, StatusCode},
        response::{Html, IntoResponse, Response},
        routing::get,
        Router,
    };
    use bytes::Bytes;
    use futures::StreamExt;
    use image::codecs::jpeg::JpegEncoder;
    use image::RgbImage;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;
    use tower_http::trace::TraceLayer;
    use tracing::{debug, info};
    use uuid::Uuid;

    /// MJPEG streaming server doubling as the loop's video sink: published
    /// frames are JPEG-encoded at the current quality and fanned out to
    /// connected clients through a watch channel.
    pub struct MjpegStreamServer {
        bind_addr: String,
        quality: AtomicU8,
        frame_tx: watch::Sender<Option<Bytes>>,
        telemetry: Arc<LatestValueTelemetry>,
    }

    #[derive(Clone)]
    struct ServerState {
        frames: watch::Receiver<Option<Bytes>>,
        telemetry: Arc<LatestValueTelemetry>,
    }

    impl MjpegStreamServer {
        pub fn new(config: &StreamConfig, telemetry: Arc<LatestValueTelemetry>) -> Self {
            let (frame_tx, _) = watch::channel(None);

            Self {
                bind_addr: format!("{}:{}", config.ip, config.port),
                quality: AtomicU8::new(config.quality),
                frame_tx,
                telemetry,
            }
        }

        /// Serve the viewer page, the MJPEG stream and the status endpoint
        /// until cancelled.
        pub async fn serve(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
            let state = ServerState {
                frames: self.frame_tx.subscribe(),
                telemetry: Arc::clone(&self.telemetry),
            };

            let app = Router::new()
                .route("/", get(feed_page_handler))
                .route("/stream.mjpg", get(mjpeg_stream_handler))
                .route("/status", get(status_handler))
                .layer(TraceLayer::new_for_http())
                .with_state(state);

            info!("Starting MJPEG streaming server on {}", self.bind_addr);

            let listener = tokio::net::TcpListener::bind(&self.bind_addr)
                .await
                .map_err(|e| StreamError::BindFailed {
                    address: self.bind_addr.clone(),
                    source: e,
                })?;

            axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
                .map_err(|e| StreamError::StartupFailed {
                    details: format!("Server error: {}", e),
                })?;

            info!("MJPEG streaming server stopped");
            Ok(())
        }
    }

    impl VideoSink for MjpegStreamServer {
        fn publish(&self, frame: &RgbImage) -> Result<()> {
            let mut jpeg = Vec::new();
            let quality = self.quality.load(Ordering::Relaxed);
            let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
            encoder
                .encode_image(frame)
                .map_err(|e| StreamError::PublishFailed {
                    details: format!("JPEG encode failed: {}", e),
                })?;

            self.frame_tx.send_replace(Some(Bytes::from(jpeg)));
            Ok(())
        }

        fn set_quality(&self, quality: u8) {
            let quality = quality.clamp(1, 100);
            debug!("Stream quality set to {}", quality);
            self.quality.store(quality, Ordering::Relaxed);
        }
    }

    /// Handler for the MJPEG streaming endpoint
    async fn mjpeg_stream_handler(State(state): State<ServerState>) -> impl IntoResponse {
        let client = Uuid::new_v4();
        info!("New MJPEG stream client {} connected", client);

        let mut frames = state.frames.clone();
        let stream = async_stream::stream! {
            let mut frames_streamed = 0u64;
            let mut bytes_streamed = 0u64;

            loop {
                if frames.changed().await.is_err() {
                    break;
                }

                let jpeg = frames.borrow_and_update().clone();
                if let Some(jpeg) = jpeg {
                    frames_streamed += 1;
                    bytes_streamed += jpeg.len() as u64;

                    let boundary = format!(
                        "--FRAME\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                        jpeg.len()
                    );

                    yield Ok::<_, axum::Error>(Bytes::from(boundary));
                    yield Ok(jpeg);
                    yield Ok(Bytes::from("\r\n"));

                    if frames_streamed % 300 == 0 {
                        debug!(
                            "Stream client {}: {} frames, {:.1} MB total",
                            client,
                            frames_streamed,
                            bytes_streamed as f64 / 1_048_576.0
                        );
                    }
                }
            }

            info!("MJPEG stream client {} disconnected", client);
        };

        Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                "multipart/x-mixed-replace; boundary=FRAME",
            )
            .header(header::CACHE_CONTROL, "no-cache, private")
            .header(header::PRAGMA, "no-cache")
            .body(axum::body::Body::from_stream(stream.boxed()))
            .unwrap()
    }

    /// Handler for the status endpoint: latest telemetry samples as JSON
    async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
        let status = serde_json::json!({
            "status": "ok",
            "samples": state.telemetry.snapshot(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (StatusCode::OK, axum::Json(status))
    }

    /// Simple HTML page for viewing the MJPEG stream
    async fn feed_page_handler() -> impl IntoResponse {
        Html(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Goalcam Feed</title>
    <style>
        :root { color-scheme: dark; }
        body {
            margin: 0;
            background: #000;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
        }
        img.feed {
            display: block;
            max-width: 100vw;
            max-height: 100vh;
            width: auto;
            height: auto;
            object-fit: contain;
            background: #000;
        }
    </style>
</head>
<body>
    <img class="feed" src="/stream.mjpg" alt="Goalcam feed">
</body>
</html>
"#,
        )
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::VideoSink;
    use crate::error::{Result, StreamError};
    use image::RgbImage;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Test sink that keeps a copy of everything published.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub frames: Mutex<Vec<RgbImage>>,
        pub quality_settings: Mutex<Vec<u8>>,
        pub fail_next_publishes: AtomicU32,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn published(&self) -> usize {
            self.frames.lock().len()
        }

        pub fn no_signal_count(&self) -> usize {
            self.frames
                .lock()
                .iter()
                .filter(|f| crate::frame::is_no_signal(f))
                .count()
        }

        pub fn fail_next_publishes(&self, count: u32) {
            self.fail_next_publishes.store(count, Ordering::SeqCst);
        }
    }

    impl VideoSink for RecordingSink {
        fn publish(&self, frame: &RgbImage) -> Result<()> {
            let pending = self.fail_next_publishes.load(Ordering::SeqCst);
            if pending > 0 {
                self.fail_next_publishes.store(pending - 1, Ordering::SeqCst);
                return Err(StreamError::PublishFailed {
                    details: "injected publish fault".to_string(),
                }
                .into());
            }

            self.frames.lock().push(frame.clone());
            Ok(())
        }

        fn set_quality(&self, quality: u8) {
            self.quality_settings.lock().push(quality);
        }
    }

    #[cfg(feature = "streaming")]
    mod server_tests {
        use super::super::MjpegStreamServer;
        use super::*;
        use crate::config::GoalcamConfig;
        use crate::telemetry::LatestValueTelemetry;
        use std::sync::Arc;

        #[test]
        fn test_publish_encodes_jpeg() {
            let telemetry = Arc::new(LatestValueTelemetry::new());
            let server = MjpegStreamServer::new(&GoalcamConfig::default().stream, telemetry);

            let frame = RgbImage::from_pixel(64, 48, image::Rgb([0, 128, 0]));
            server.set_quality(80);
            server.publish(&frame).unwrap();
        }
    }
}
