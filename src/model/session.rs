use super::prediction::{AudioAnalysisRecord, PredictionRecord};
use super::scores::LabelScores;
use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Persisted form of one analysis session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_timestamp: String,
    pub input_directory: String,
    pub output_directory: String,
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub classifiers_used: Vec<String>,
    pub results: Vec<AudioResult>,
}

impl SessionRecord {
    /// Parse a session file written by `ResultAggregator::persist`
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let text = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Persisted form of one audio item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioResult {
    pub audio_file: String,
    pub audio_duration_seconds: f64,
    pub sample_rate: u32,

    /// Added by the phrase pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,

    /// Added by the phrase pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase_duration_seconds: Option<f64>,

    pub models: Vec<ModelResult>,
}

impl AudioResult {
    pub fn from_record(record: &AudioAnalysisRecord) -> Self {
        Self {
            audio_file: record.audio_path.to_string_lossy().into_owned(),
            audio_duration_seconds: round_to(record.duration_seconds, 3),
            sample_rate: record.sample_rate_hz,
            bpm: None,
            phrase_duration_seconds: None,
            models: record
                .predictions
                .iter()
                .map(|p| ModelResult::Raw(RawPrediction::from_record(p)))
                .collect(),
        }
    }
}

/// One model's output for one audio item.
///
/// Untagged: a JSON entry carrying bar fields parses as `PhraseAugmented`,
/// anything else as `Raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelResult {
    PhraseAugmented(PhraseAugmentedPrediction),
    Raw(RawPrediction),
}

impl ModelResult {
    pub fn raw(&self) -> &RawPrediction {
        match self {
            ModelResult::PhraseAugmented(p) => &p.raw,
            ModelResult::Raw(p) => p,
        }
    }

    pub fn is_phrase_augmented(&self) -> bool {
        matches!(self, ModelResult::PhraseAugmented(_))
    }
}

/// Per-window predictions as produced by the analysis pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    pub model_name: String,
    pub model_version: String,
    pub model_path: String,
    pub embedding_model: String,
    pub embedding_model_path: String,
    pub classes: Vec<String>,
    pub num_segments: usize,
    pub segment_predictions: Vec<Vec<f32>>,
    pub aggregated_predictions: LabelScores,
}

impl RawPrediction {
    pub fn from_record(record: &PredictionRecord) -> Self {
        Self {
            model_name: record.classifier_name.clone(),
            model_version: record.classifier_version.clone(),
            model_path: record.classifier_path.to_string_lossy().into_owned(),
            embedding_model: record.embedding_model_name.clone(),
            embedding_model_path: record.embedding_model_path.to_string_lossy().into_owned(),
            classes: record.class_labels.clone(),
            num_segments: record.segment_count,
            segment_predictions: record.segment_predictions.clone(),
            aggregated_predictions: record.aggregated_predictions.clone(),
        }
    }
}

/// Raw predictions plus their 16-bar phrase re-aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseAugmentedPrediction {
    #[serde(flatten)]
    pub raw: RawPrediction,
    pub bar_predictions: Vec<Vec<f32>>,
    pub aggregated_bar_predictions: LabelScores,
}

/// Round to `decimals` places, ties to even
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
