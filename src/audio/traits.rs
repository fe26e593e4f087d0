//! Audio collaborator traits - allow swapping real decoders for test doubles

use crate::error::{InferenceError, TempoError};
use std::path::Path;

/// Loads an audio file as a mono signal at a fixed sample rate
pub trait AudioLoader {
    /// Decode `path`, downmix to mono and resample to `sample_rate`
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Vec<f32>, InferenceError>;
}

/// Estimates the tempo of an audio file
pub trait TempoEstimator {
    /// Estimated beats per minute (always > 0 on success)
    fn estimate_bpm(&self, path: &Path) -> Result<f64, TempoError>;
}

/// Duration in seconds of `sample_count` samples at `sample_rate`
pub fn duration_seconds(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}
