use image::{GrayImage, Rgb, RgbImage};

use crate::config::VisionConfig;
use crate::error::VisionError;

/// Mask value for a pixel inside the configured color range.
pub const MASK_ON: u8 = 255;

/// Hue/saturation/value window on a 0-255 scale, all bounds inclusive.
/// Re-read from configuration at every transition into the processed feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub hue: (u8, u8),
    pub saturation: (u8, u8),
    pub value: (u8, u8),
}

impl ColorRange {
    pub fn from_config(vision: &VisionConfig) -> Result<Self, VisionError> {
        for (name, (min, max)) in [
            ("hue", vision.hue),
            ("saturation", vision.saturation),
            ("value", vision.value),
        ] {
            if min > max {
                return Err(VisionError::BadRange {
                    details: format!("{} min {} exceeds max {}", name, min, max),
                });
            }
        }

        Ok(Self {
            hue: vision.hue,
            saturation: vision.saturation,
            value: vision.value,
        })
    }

    fn contains(&self, (h, s, v): (u8, u8, u8)) -> bool {
        self.hue.0 <= h
            && h <= self.hue.1
            && self.saturation.0 <= s
            && s <= self.saturation.1
            && self.value.0 <= v
            && v <= self.value.1
    }
}

/// Convert an RGB pixel to hue/saturation/value, each on a 0-255 scale.
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> (u8, u8, u8) {
    let r = pixel.0[0] as f32 / 255.0;
    let g = pixel.0[1] as f32 / 255.0;
    let b = pixel.0[2] as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (
        (hue_deg / 360.0 * 255.0).round() as u8,
        (saturation * 255.0).round() as u8,
        (max * 255.0).round() as u8,
    )
}

/// Pointwise HSV thresholding: a mask pixel is on iff the source pixel's
/// hue, saturation and value each fall inside the range. No blur or
/// denoise; deterministic for identical inputs. The mask buffer is resized
/// only when the source dimensions changed since the last call.
pub fn threshold_hsv(src: &RgbImage, range: &ColorRange, mask: &mut GrayImage) {
    if mask.dimensions() != src.dimensions() {
        *mask = GrayImage::new(src.width(), src.height());
    }

    for (src_px, mask_px) in src.pixels().zip(mask.pixels_mut()) {
        mask_px.0[0] = if range.contains(rgb_to_hsv(src_px)) {
            MASK_ON
        } else {
            0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_range() -> ColorRange {
        ColorRange {
            hue: (0, 255),
            saturation: (0, 255),
            value: (0, 255),
        }
    }

    fn on_count(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] == MASK_ON).count()
    }

    /// Deterministic pseudo-random source for the property tests.
    struct Lcg(u32);

    impl Lcg {
        fn next(&mut self) -> u32 {
            self.0 = self.0.wrapping_mul(1664525).wrapping_add(1013904223);
            self.0
        }

        fn byte(&mut self) -> u8 {
            (self.next() >> 24) as u8
        }
    }

    #[test]
    fn test_rgb_to_hsv_known_colors() {
        // Pure green: hue 120 degrees on the 0-255 scale, fully saturated.
        assert_eq!(rgb_to_hsv(&Rgb([0, 255, 0])), (85, 255, 255));
        // Pure red sits at hue 0.
        assert_eq!(rgb_to_hsv(&Rgb([255, 0, 0])), (0, 255, 255));
        // Grays carry no hue or saturation.
        assert_eq!(rgb_to_hsv(&Rgb([128, 128, 128])), (0, 0, 128));
        assert_eq!(rgb_to_hsv(&Rgb([0, 0, 0])), (0, 0, 0));
    }

    #[test]
    fn test_threshold_segments_green_blob() {
        let mut src = RgbImage::new(16, 16);
        for y in 4..8 {
            for x in 4..8 {
                src.put_pixel(x, y, Rgb([0, 255, 0]));
            }
        }

        let range = ColorRange {
            hue: (60, 125),
            saturation: (100, 255),
            value: (80, 255),
        };
        let mut mask = GrayImage::new(1, 1);
        threshold_hsv(&src, &range, &mut mask);

        assert_eq!(mask.dimensions(), (16, 16));
        assert_eq!(on_count(&mask), 16);
        assert_eq!(mask.get_pixel(5, 5).0[0], MASK_ON);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn test_threshold_is_deterministic() {
        let mut rng = Lcg(0xC0FFEE);
        let mut src = RgbImage::new(24, 24);
        for px in src.pixels_mut() {
            *px = Rgb([rng.byte(), rng.byte(), rng.byte()]);
        }

        let range = ColorRange {
            hue: (30, 200),
            saturation: (20, 220),
            value: (10, 240),
        };
        let mut mask_a = GrayImage::new(24, 24);
        let mut mask_b = GrayImage::new(24, 24);
        threshold_hsv(&src, &range, &mut mask_a);
        threshold_hsv(&src, &range, &mut mask_b);
        assert_eq!(mask_a.as_raw(), mask_b.as_raw());
    }

    #[test]
    fn test_on_count_monotone_under_range_widening() {
        let mut rng = Lcg(0x5EED);
        let mut src = RgbImage::new(32, 32);
        for px in src.pixels_mut() {
            *px = Rgb([rng.byte(), rng.byte(), rng.byte()]);
        }

        let mut mask = GrayImage::new(32, 32);
        for _ in 0..50 {
            // Build a random range and a strictly containing wider range.
            let narrow_of = |rng: &mut Lcg| {
                let a = rng.byte();
                let b = rng.byte();
                (a.min(b), a.max(b))
            };
            let widen = |(min, max): (u8, u8), rng: &mut Lcg| {
                (
                    min.saturating_sub(rng.byte() % 32),
                    max.saturating_add(rng.byte() % 32),
                )
            };

            let hue = narrow_of(&mut rng);
            let saturation = narrow_of(&mut rng);
            let value = narrow_of(&mut rng);

            let narrow = ColorRange {
                hue,
                saturation,
                value,
            };
            let wide = ColorRange {
                hue: widen(hue, &mut rng),
                saturation: widen(saturation, &mut rng),
                value: widen(value, &mut rng),
            };

            threshold_hsv(&src, &narrow, &mut mask);
            let narrow_on = on_count(&mask);
            threshold_hsv(&src, &wide, &mut mask);
            let wide_on = on_count(&mask);

            assert!(
                narrow_on <= wide_on,
                "narrow range matched {} pixels but wider range matched {}",
                narrow_on,
                wide_on
            );
        }
    }

    #[test]
    fn test_from_config_rejects_inverted_range() {
        let mut vision = crate::config::GoalcamConfig::default().vision;
        vision.saturation = (200, 100);
        assert!(ColorRange::from_config(&vision).is_err());
    }
}
