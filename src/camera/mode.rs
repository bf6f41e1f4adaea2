use serde::{Deserialize, Serialize};
use std::fmt;

/// The feed selection. Exactly one mode is active at a time; a requested
/// mode may differ transiently until the loop applies it at an iteration
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CameraMode {
    /// No feed selected; the static no-signal frame is published.
    NoFeed = 0,
    /// Front camera through the segmentation pipeline.
    ProcessedFront = 1,
    /// Front camera, unmodified.
    RawFront = 2,
    /// Rear camera, unmodified.
    RawRear = 3,
}

impl CameraMode {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a mode stored in an atomic cell. Unknown values fall back to
    /// NoFeed, the loop's default dispatch arm.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => CameraMode::ProcessedFront,
            2 => CameraMode::RawFront,
            3 => CameraMode::RawRear,
            _ => CameraMode::NoFeed,
        }
    }

    pub fn uses_front(self) -> bool {
        matches!(self, CameraMode::ProcessedFront | CameraMode::RawFront)
    }

    pub fn uses_rear(self) -> bool {
        matches!(self, CameraMode::RawRear)
    }

    pub fn is_processed(self) -> bool {
        matches!(self, CameraMode::ProcessedFront)
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraMode::NoFeed => "no feed",
            CameraMode::ProcessedFront => "processed front",
            CameraMode::RawFront => "raw front",
            CameraMode::RawRear => "raw rear",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips_through_u8() {
        for mode in [
            CameraMode::NoFeed,
            CameraMode::ProcessedFront,
            CameraMode::RawFront,
            CameraMode::RawRear,
        ] {
            assert_eq!(CameraMode::from_u8(mode.as_u8()), mode);
        }
    }

    #[test]
    fn test_unknown_u8_falls_back_to_no_feed() {
        assert_eq!(CameraMode::from_u8(250), CameraMode::NoFeed);
    }

    #[test]
    fn test_camera_usage() {
        assert!(CameraMode::ProcessedFront.uses_front());
        assert!(CameraMode::RawFront.uses_front());
        assert!(!CameraMode::RawRear.uses_front());
        assert!(CameraMode::RawRear.uses_rear());
        assert!(!CameraMode::NoFeed.uses_front());
        assert!(!CameraMode::NoFeed.uses_rear());
        assert!(CameraMode::ProcessedFront.is_processed());
        assert!(!CameraMode::RawFront.is_processed());
    }
}
