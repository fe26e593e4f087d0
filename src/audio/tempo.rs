//! Tempo estimation using stratum-dsp
//!
//! The whole file is decoded once at its native rate and handed to
//! stratum-dsp. The detected BPM is folded by octaves into a configurable
//! range so half/double-time detections land where DJ software expects them.

use super::decoder::decode_to_mono;
use super::traits::TempoEstimator;
use crate::config::{DEFAULT_MAX_BPM, DEFAULT_MIN_BPM};
use crate::error::TempoError;
use std::path::Path;
use stratum_dsp::{analyze_audio, AnalysisConfig};

/// Shortest signal (in seconds) worth running beat tracking on
const MIN_ANALYSIS_SECONDS: usize = 1;

/// BPM detection backed by stratum-dsp
#[derive(Debug, Clone, Copy)]
pub struct StratumTempoEstimator {
    min_bpm: f32,
    max_bpm: f32,
}

impl Default for StratumTempoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl StratumTempoEstimator {
    pub fn new() -> Self {
        Self {
            min_bpm: DEFAULT_MIN_BPM,
            max_bpm: DEFAULT_MAX_BPM,
        }
    }

    /// Fold detections into `[min_bpm, max_bpm]`. Zero disables folding.
    pub fn with_bpm_range(mut self, min_bpm: f32, max_bpm: f32) -> Self {
        self.min_bpm = min_bpm;
        self.max_bpm = max_bpm;
        self
    }
}

impl TempoEstimator for StratumTempoEstimator {
    fn estimate_bpm(&self, path: &Path) -> Result<f64, TempoError> {
        log::debug!("Estimating tempo with stratum-dsp: {:?}", path);

        let (samples, sample_rate) = decode_to_mono(path).map_err(|message| TempoError::Decode {
            path: path.to_path_buf(),
            message,
        })?;

        if samples.len() < sample_rate as usize * MIN_ANALYSIS_SECONDS {
            return Err(TempoError::Analysis("Audio too short for analysis".to_string()));
        }

        let result = analyze_audio(&samples, sample_rate, AnalysisConfig::default())
            .map_err(|e| TempoError::Analysis(format!("{:?}", e)))?;
        drop(samples);

        if !result.bpm.is_finite() || result.bpm <= 0.0 {
            return Err(TempoError::NotDetected);
        }

        let bpm = fold_bpm(result.bpm, self.min_bpm, self.max_bpm);
        log::info!("Tempo for {:?}: {:.2} BPM", path, bpm);
        Ok(bpm as f64)
    }
}

/// Double or halve `bpm` until it sits in `[min_bpm, max_bpm]` where possible
pub fn fold_bpm(bpm: f32, min_bpm: f32, max_bpm: f32) -> f32 {
    let mut bpm = bpm;
    if min_bpm > 0.0 && max_bpm > 0.0 && bpm > 0.0 {
        while bpm < min_bpm && bpm * 2.0 <= max_bpm {
            bpm *= 2.0;
            log::debug!("BPM doubled to {:.1} (was below minimum {})", bpm, min_bpm);
        }
        while bpm > max_bpm && bpm / 2.0 >= min_bpm {
            bpm /= 2.0;
            log::debug!("BPM halved to {:.1} (was above maximum {})", bpm, max_bpm);
        }
    }
    bpm
}
