use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoalcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("System error: {message}")]
    System { message: String },
}

impl GoalcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Errors raised by the physical camera layer.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera '{name}' is not present")]
    NotPresent { name: String },

    #[error("camera '{name}' is not capturing")]
    NotCapturing { name: String },

    #[error("failed to construct camera '{name}': {details}")]
    Construction { name: String, details: String },

    #[error("failed to open camera '{name}': {details}")]
    OpenFailed { name: String, details: String },

    #[error("capture fault on camera '{name}': {details}")]
    CaptureFailed { name: String, details: String },

    #[error("camera configuration error: {details}")]
    Configuration { details: String },
}

/// Errors raised by the segmentation pipeline.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("invalid color range: {details}")]
    BadRange { details: String },

    #[error("frame encoding failed: {details}")]
    FrameEncoding { details: String },
}

/// Errors raised by the video publishing layer.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        source: std::io::Error,
    },

    #[error("stream server failed to start: {details}")]
    StartupFailed { details: String },

    #[error("failed to publish frame: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, GoalcamError>;
