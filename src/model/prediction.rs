use super::scores::LabelScores;
use super::spec::ClassifierSpec;
use ndarray::{Array2, Axis};
use std::path::PathBuf;

/// Output of one classifier on one audio item
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub classifier_name: String,
    pub classifier_version: String,
    pub classifier_path: PathBuf,
    pub embedding_model_name: String,
    pub embedding_model_path: PathBuf,
    pub class_labels: Vec<String>,
    /// One probability vector per analysis window, each `class_labels.len()` wide
    pub segment_predictions: Vec<Vec<f32>>,
    /// Per-label mean over all segments
    pub aggregated_predictions: LabelScores,
    pub segment_count: usize,
}

impl PredictionRecord {
    /// Build a record from a segments x classes matrix.
    ///
    /// The caller guarantees the column count matches the label count.
    pub fn from_matrix(spec: &ClassifierSpec, predictions: &Array2<f32>) -> Self {
        let segment_predictions: Vec<Vec<f32>> = predictions
            .outer_iter()
            .map(|row| row.to_vec())
            .collect();

        // mean_axis is None for zero segments
        let aggregated_predictions = match predictions.mean_axis(Axis(0)) {
            Some(mean) => LabelScores::from_row(&spec.class_labels, &mean.to_vec()),
            None => LabelScores::new(),
        };

        Self {
            classifier_name: spec.name.clone(),
            classifier_version: spec.version.clone(),
            classifier_path: spec.artifact_path.clone(),
            embedding_model_name: spec.embedding_model.name.clone(),
            embedding_model_path: spec.embedding_model.artifact_path.clone(),
            class_labels: spec.class_labels.clone(),
            segment_count: segment_predictions.len(),
            segment_predictions,
            aggregated_predictions,
        }
    }
}

/// All predictions for one successfully loaded audio item
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAnalysisRecord {
    pub audio_path: PathBuf,
    pub duration_seconds: f64,
    pub sample_rate_hz: u32,
    /// In classifier registration order; failed classifiers are absent
    pub predictions: Vec<PredictionRecord>,
}
