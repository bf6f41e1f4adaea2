use parking_lot::RwLock;
use std::collections::HashMap;

/// Telemetry sample published every loop iteration.
pub const FPS_SAMPLE: &str = "vision_loop_fps";
/// Telemetry sample published every processed-mode iteration.
pub const PARTICLE_COUNT_SAMPLE: &str = "particle_count";

/// Sink for named numeric samples. The dashboard side of this is out of
/// scope; implementations only need to accept one sample per call.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, name: &str, value: f64);
}

/// Keeps the most recent value per sample name, for the stream server's
/// status endpoint.
#[derive(Default)]
pub struct LatestValueTelemetry {
    samples: RwLock<HashMap<String, f64>>,
}

impl LatestValueTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.samples.read().get(name).copied()
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.samples.read().clone()
    }
}

impl TelemetrySink for LatestValueTelemetry {
    fn record(&self, name: &str, value: f64) {
        self.samples.write().insert(name.to_string(), value);
    }
}
