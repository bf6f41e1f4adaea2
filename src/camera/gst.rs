use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use image::RgbImage;
use tracing::{debug, info};

use super::device::VideoDevice;
use super::profile::{CameraProfile, WhiteBalance};
use crate::error::{CameraError, Result};
use crate::frame::ensure_frame_size;

const GRAB_TIMEOUT_MS: u64 = 500;

/// GStreamer-backed camera: a `v4l2src` pipeline delivering raw RGB frames
/// through an appsink the loop pulls synchronously.
pub struct GstVideoDevice {
    name: String,
    device_path: String,
    pipeline: Option<Pipeline>,
    appsink: Option<AppSink>,
    capturing: bool,
}

impl GstVideoDevice {
    pub fn new(name: &str, device_path: &str) -> Result<Self> {
        gstreamer::init().map_err(|e| CameraError::Construction {
            name: name.to_string(),
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self {
            name: name.to_string(),
            device_path: device_path.to_string(),
            pipeline: None,
            appsink: None,
            capturing: false,
        })
    }

    /// Build the capture pipeline string for a profile. Brightness and
    /// white balance ride on the v4l2 extra-controls structure.
    fn build_pipeline_string(&self, profile: &CameraProfile) -> String {
        let (width, height) = profile.resolution;

        let mut controls = Vec::new();
        if let Some(brightness) = profile.brightness {
            controls.push(format!("brightness={}", brightness));
        }
        match profile.white_balance {
            WhiteBalance::Auto => controls.push("white_balance_automatic=1".to_string()),
            WhiteBalance::FixedIndoor => {
                controls.push("white_balance_automatic=0".to_string());
            }
        }

        format!(
            "v4l2src device={} io-mode=mmap do-timestamp=true extra-controls=\"controls,{}\" ! \
             video/x-raw,width={},height={},framerate={}/1 ! \
             videoconvert ! video/x-raw,format=RGB ! \
             queue max-size-buffers=4 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=2 drop=true enable-last-sample=false emit-signals=false",
            self.device_path,
            controls.join(","),
            width,
            height,
            profile.fps
        )
    }

    fn appsink(&self) -> Result<&AppSink> {
        self.appsink
            .as_ref()
            .ok_or_else(|| {
                CameraError::NotCapturing {
                    name: self.name.clone(),
                }
                .into()
            })
    }
}

#[async_trait]
impl VideoDevice for GstVideoDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.pipeline.is_some()
    }

    async fn open(&mut self, profile: &CameraProfile) -> Result<()> {
        // Re-opening with a new profile tears down the previous pipeline.
        if self.pipeline.is_some() {
            self.close().await?;
        }

        let pipeline_desc = self.build_pipeline_string(profile);
        info!("Opening {} with pipeline: {}", self.name, pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::OpenFailed {
                name: self.name.clone(),
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::OpenFailed {
                name: self.name.clone(),
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::OpenFailed {
                name: self.name.clone(),
                details: "Failed to get appsink element".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::OpenFailed {
                name: self.name.clone(),
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        pipeline
            .set_state(gstreamer::State::Ready)
            .map_err(|e| CameraError::OpenFailed {
                name: self.name.clone(),
                details: format!("Device refused to open: {}", e),
            })?;

        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);
        Ok(())
    }

    async fn start_capture(&mut self) -> Result<()> {
        let pipeline = self.pipeline.as_ref().ok_or_else(|| CameraError::NotCapturing {
            name: self.name.clone(),
        })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::OpenFailed {
                name: self.name.clone(),
                details: format!("Failed to start pipeline: {}", e),
            })?;

        self.capturing = true;
        debug!("{} capturing", self.name);
        Ok(())
    }

    async fn stop_capture(&mut self) -> Result<()> {
        if let Some(pipeline) = self.pipeline.as_ref() {
            let _ = pipeline.set_state(gstreamer::State::Ready);
        }
        self.capturing = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gstreamer::State::Null);
            info!("{} closed", self.name);
        }
        self.appsink = None;
        self.capturing = false;
        Ok(())
    }

    async fn grab_frame(&mut self, frame: &mut RgbImage) -> Result<()> {
        if !self.capturing {
            return Err(CameraError::NotCapturing {
                name: self.name.clone(),
            }
            .into());
        }

        let name = self.name.clone();
        let appsink = self.appsink()?;

        let timeout = gstreamer::ClockTime::from_mseconds(GRAB_TIMEOUT_MS);
        let sample = appsink
            .try_pull_sample(timeout)
            .ok_or_else(|| CameraError::CaptureFailed {
                name: name.clone(),
                details: "No sample available (timeout)".to_string(),
            })?;

        let caps = sample.caps().ok_or_else(|| CameraError::CaptureFailed {
            name: name.clone(),
            details: "No caps in sample".to_string(),
        })?;

        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureFailed {
            name: name.clone(),
            details: format!("Failed to get video info: {}", e),
        })?;

        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureFailed {
            name: name.clone(),
            details: "No buffer in sample".to_string(),
        })?;

        let map = buffer.map_readable().map_err(|e| CameraError::CaptureFailed {
            name: name.clone(),
            details: format!("Failed to map buffer: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;

        ensure_frame_size(frame, width, height);

        let data = map.as_slice();
        let out: &mut [u8] = &mut **frame;
        for (y, row) in out.chunks_exact_mut(row_bytes).enumerate() {
            let start = y * stride;
            row.copy_from_slice(&data[start..start + row_bytes]);
        }

        Ok(())
    }
}
