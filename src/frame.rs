use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_ellipse_mut, draw_line_segment_mut, draw_text_mut};
use rusttype::{Font, Scale};
use tracing::{debug, warn};

use crate::config::SystemConfig;

/// Resolution of the raw feeds and the static frames.
pub const RAW_WIDTH: u32 = 640;
pub const RAW_HEIGHT: u32 = 480;

/// The five reusable frame buffers the loop publishes from. Allocated once;
/// the live buffers are resized only when a feed switch changes resolution,
/// never per iteration.
pub struct FramePool {
    /// Front camera color frame (raw and processed modes)
    pub front: RgbImage,
    /// Rear camera color frame
    pub rear: RgbImage,
    /// Binary mask produced by thresholding the front frame
    pub front_mask: GrayImage,
    /// Backdrop shown while a feed switch is in progress
    pub waiting: RgbImage,
    /// Static frame shown when no feed is selected or a fault occurred
    pub no_signal: RgbImage,
}

impl FramePool {
    pub fn new(system: &SystemConfig) -> Self {
        let mut no_signal = RgbImage::new(RAW_WIDTH, RAW_HEIGHT);
        paint_no_signal(&mut no_signal);

        let waiting = waiting_backdrop(system);

        Self {
            front: RgbImage::new(RAW_WIDTH, RAW_HEIGHT),
            rear: RgbImage::new(RAW_WIDTH, RAW_HEIGHT),
            front_mask: GrayImage::new(RAW_WIDTH, RAW_HEIGHT),
            waiting,
            no_signal,
        }
    }
}

/// Grow or shrink a color buffer to the given dimensions. A no-op when the
/// size already matches, so steady-state iterations never reallocate.
pub fn ensure_frame_size(frame: &mut RgbImage, width: u32, height: u32) {
    if frame.dimensions() != (width, height) {
        *frame = RgbImage::new(width, height);
    }
}

/// Load the overlay font, degrading to shapes-only frames when unavailable.
pub fn load_font(path: &str) -> Option<Font<'static>> {
    match std::fs::read(path) {
        Ok(data) => match Font::try_from_vec(data) {
            Some(font) => Some(font),
            None => {
                warn!("Failed to parse font file '{}'; static frames will be text-free", path);
                None
            }
        },
        Err(e) => {
            debug!("Font file '{}' unavailable ({}); static frames will be text-free", path, e);
            None
        }
    }
}

/// Paint the "no feed" glyph: a red ring with a diagonal slash. Shown for
/// NoFeed mode and after faults.
fn paint_no_signal(frame: &mut RgbImage) {
    let red = overlay_rgb(overlay_color(0xFF, 0x00, 0x00));
    let black = Rgb([0, 0, 0]);
    let (cx, cy) = (RAW_WIDTH as i32 / 2, RAW_HEIGHT as i32 / 2);

    draw_filled_ellipse_mut(frame, (cx, cy), 240, 240, red);
    draw_filled_ellipse_mut(frame, (cx, cy), 230, 230, black);

    // Slash from upper-left to lower-right of the ring, thickened by
    // offsetting the endpoints.
    let r = 230.0 * std::f32::consts::FRAC_1_SQRT_2;
    let (x0, y0) = (cx as f32 - r, cy as f32 - r);
    let (x1, y1) = (cx as f32 + r, cy as f32 + r);
    draw_line_segment_mut(frame, (x0, y0), (x1, y1), red);
    for i in 1..=5 {
        let off = i as f32;
        draw_line_segment_mut(frame, (x0, y0 - off), (x1 + off, y1), red);
        draw_line_segment_mut(frame, (x0 - off, y0), (x1, y1 + off), red);
    }
}

/// Paint the feed-switch backdrop. The loading indicator animates on top of
/// a copy of this frame.
pub fn waiting_backdrop(system: &SystemConfig) -> RgbImage {
    let font = load_font(&system.font_path);
    paint_waiting(font.as_ref())
}

fn paint_waiting(font: Option<&Font<'static>>) -> RgbImage {
    let mut frame = RgbImage::from_pixel(RAW_WIDTH, RAW_HEIGHT, Rgb([10, 16, 40]));

    if let Some(font) = font {
        let scale = Scale::uniform(36.0);
        draw_text_mut(
            &mut frame,
            Rgb([220, 220, 220]),
            200,
            (RAW_HEIGHT as i32 / 2) - 18,
            scale,
            font,
            "SWITCHING FEED",
        );
    }

    frame
}

/// Clamp each channel to [0, 255] and pack into the overlay color encoding:
/// green in bits 16-23, blue in bits 8-15, red in bits 0-7.
pub fn overlay_color(r: i32, g: i32, b: i32) -> u32 {
    let r = r.clamp(0, 0xFF) as u32;
    let g = g.clamp(0, 0xFF) as u32;
    let b = b.clamp(0, 0xFF) as u32;
    (g << 16) | (b << 8) | r
}

/// Unpack an overlay color into an image pixel.
pub fn overlay_rgb(packed: u32) -> Rgb<u8> {
    Rgb([
        (packed & 0xFF) as u8,
        ((packed >> 16) & 0xFF) as u8,
        ((packed >> 8) & 0xFF) as u8,
    ])
}

/// Whether a frame is the no-signal glyph: ring and slash both red, ring
/// interior black. Camera frames and the waiting backdrop never match.
#[cfg(test)]
pub(crate) fn is_no_signal(frame: &RgbImage) -> bool {
    frame.dimensions() == (RAW_WIDTH, RAW_HEIGHT)
        && *frame.get_pixel(320, 5) == Rgb([255, 0, 0])
        && *frame.get_pixel(320, 240) == Rgb([255, 0, 0])
        && *frame.get_pixel(100, 240) == Rgb([0, 0, 0])
}
