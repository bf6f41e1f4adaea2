use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::camera::CameraMode;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoalcamConfig {
    pub camera: CameraConfig,
    pub vision: VisionConfig,
    pub stream: StreamConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Front camera device path (e.g., /dev/video0)
    #[serde(default = "default_front_device")]
    pub front_device: String,

    /// Rear camera device path
    #[serde(default = "default_rear_device")]
    pub rear_device: String,

    /// Brightness applied to the front camera while segmenting. Raw feeds
    /// run at brightness 0; segmentation wants a darker image so the lit
    /// goal dominates.
    #[serde(default = "default_processed_brightness")]
    pub processed_brightness: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VisionConfig {
    /// Hue range (min, max) on a 0-255 scale
    #[serde(default = "default_hue")]
    pub hue: (u8, u8),

    /// Saturation range (min, max) on a 0-255 scale
    #[serde(default = "default_saturation")]
    pub saturation: (u8, u8),

    /// Value range (min, max) on a 0-255 scale
    #[serde(default = "default_value")]
    pub value: (u8, u8),

    /// RGB color of the centroid markers drawn on the processed feed
    #[serde(default = "default_marker_color")]
    pub marker_color: (u8, u8, u8),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// IP address to bind to
    #[serde(default = "default_stream_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// JPEG quality (1-100) pushed to the sink at every feed switch
    #[serde(default = "default_stream_quality")]
    pub quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Feed the loop switches to before the first iteration
    #[serde(default = "default_initial_mode")]
    pub initial_mode: CameraMode,

    /// TrueType font used for the text on the static frames. Missing or
    /// unparseable fonts degrade to shapes-only frames.
    #[serde(default = "default_font_path")]
    pub font_path: String,
}

impl GoalcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("goalcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("camera.front_device", default_front_device())?
            .set_default("camera.rear_device", default_rear_device())?
            .set_default(
                "camera.processed_brightness",
                default_processed_brightness() as i64,
            )?
            .set_default(
                "vision.hue",
                vec![default_hue().0 as i64, default_hue().1 as i64],
            )?
            .set_default(
                "vision.saturation",
                vec![
                    default_saturation().0 as i64,
                    default_saturation().1 as i64,
                ],
            )?
            .set_default(
                "vision.value",
                vec![default_value().0 as i64, default_value().1 as i64],
            )?
            .set_default(
                "vision.marker_color",
                vec![
                    default_marker_color().0 as i64,
                    default_marker_color().1 as i64,
                    default_marker_color().2 as i64,
                ],
            )?
            .set_default("stream.ip", default_stream_ip())?
            .set_default("stream.port", default_stream_port() as i64)?
            .set_default("stream.quality", default_stream_quality() as i64)?
            .set_default("system.initial_mode", "raw_front")?
            .set_default("system.font_path", default_font_path())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with GOALCAM_ prefix
            .add_source(Environment::with_prefix("GOALCAM").separator("_"))
            .build()?;

        let config: GoalcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.front_device.is_empty() || self.camera.rear_device.is_empty() {
            return Err(ConfigError::Message(
                "Camera device paths must not be empty".to_string(),
            ));
        }

        for (name, (min, max)) in [
            ("hue", self.vision.hue),
            ("saturation", self.vision.saturation),
            ("value", self.vision.value),
        ] {
            if min > max {
                return Err(ConfigError::Message(format!(
                    "Vision {} range is inverted: min {} > max {}",
                    name, min, max
                )));
            }
        }

        if self.stream.port == 0 {
            return Err(ConfigError::Message(
                "Stream port must be greater than 0".to_string(),
            ));
        }

        if self.stream.quality == 0 || self.stream.quality > 100 {
            return Err(ConfigError::Message(
                "Stream quality must be in 1-100".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for GoalcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                front_device: default_front_device(),
                rear_device: default_rear_device(),
                processed_brightness: default_processed_brightness(),
            },
            vision: VisionConfig {
                hue: default_hue(),
                saturation: default_saturation(),
                value: default_value(),
                marker_color: default_marker_color(),
            },
            stream: StreamConfig {
                ip: default_stream_ip(),
                port: default_stream_port(),
                quality: default_stream_quality(),
            },
            system: SystemConfig {
                initial_mode: default_initial_mode(),
                font_path: default_font_path(),
            },
        }
    }
}

// Default value functions
fn default_front_device() -> String {
    "/dev/video0".to_string()
}
fn default_rear_device() -> String {
    "/dev/video1".to_string()
}
fn default_processed_brightness() -> i32 {
    50
}

// Defaults segment a bright green target against a dark field.
fn default_hue() -> (u8, u8) {
    (60, 125)
}
fn default_saturation() -> (u8, u8) {
    (100, 255)
}
fn default_value() -> (u8, u8) {
    (80, 255)
}
fn default_marker_color() -> (u8, u8, u8) {
    (255, 0, 0)
}

fn default_stream_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_stream_port() -> u16 {
    8080
}
fn default_stream_quality() -> u8 {
    50
}

fn default_initial_mode() -> CameraMode {
    CameraMode::RawFront
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = GoalcamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.system.initial_mode, CameraMode::RawFront);
        assert_eq!(config.vision.marker_color, (255, 0, 0));
    }

    #[test]
    fn test_config_validation_rejects_inverted_range() {
        let mut config = GoalcamConfig::default();
        config.vision.hue = (200, 100);
        assert!(config.validate().is_err());

        config.vision.hue = (100, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_bad_quality() {
        let mut config = GoalcamConfig::default();
        config.stream.quality = 0;
        assert!(config.validate().is_err());

        config.stream.quality = 101;
        assert!(config.validate().is_err());

        config.stream.quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[camera]
front_device = "/dev/video7"

[vision]
hue = [10, 20]

[system]
initial_mode = "no_feed"
"#
        )
        .unwrap();

        let config = GoalcamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.front_device, "/dev/video7");
        assert_eq!(config.vision.hue, (10, 20));
        assert_eq!(config.system.initial_mode, CameraMode::NoFeed);
        // Untouched sections keep their defaults.
        assert_eq!(config.stream.port, 8080);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = GoalcamConfig::load_from_file("/nonexistent/goalcam.toml").unwrap();
        assert_eq!(config.camera.rear_device, "/dev/video1");
        assert!(config.validate().is_ok());
    }
}
