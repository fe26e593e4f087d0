//! Inference orchestration
//!
//! One orchestrator owns the classifier list and every model handle. Extractor
//! and classifier handles live as long as the orchestrator; embeddings only
//! live for the audio item that produced them.

use super::traits::{ClassifierHead, EmbeddingExtractor, ModelRuntime};
use crate::audio::{duration_seconds, AudioLoader};
use crate::error::InferenceError;
use crate::model::{AudioAnalysisRecord, ClassifierSpec, PredictionRecord};
use crate::results::ResultAggregator;
use ndarray::Array2;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A classifier that was skipped for one audio item
#[derive(Debug)]
pub struct ClassifierFailure {
    pub classifier: String,
    pub error: InferenceError,
}

/// Outcome of analysing one audio item
#[derive(Debug)]
pub struct ItemAnalysis {
    /// Predictions from every classifier that succeeded
    pub record: AudioAnalysisRecord,
    /// Classifiers that failed for this item, in registration order
    pub failures: Vec<ClassifierFailure>,
}

pub struct InferenceOrchestrator<L: AudioLoader, R: ModelRuntime> {
    classifiers: Vec<ClassifierSpec>,
    loader: L,
    runtime: R,
    /// Extractor handles by embedding-model name
    extractors: HashMap<String, R::Extractor>,
    /// Classifier handles by artifact path
    heads: HashMap<PathBuf, R::Classifier>,
    /// Embeddings of the current item by (audio path, embedding-model name)
    embeddings: HashMap<(PathBuf, String), Array2<f32>>,
}

impl<L: AudioLoader, R: ModelRuntime> InferenceOrchestrator<L, R> {
    pub fn new(
        classifiers: Vec<ClassifierSpec>,
        loader: L,
        runtime: R,
    ) -> Result<Self, InferenceError> {
        let first = classifiers.first().ok_or(InferenceError::NoClassifiers)?;

        let sample_rate = first.embedding_model.sample_rate_hz;
        for spec in &classifiers[1..] {
            if spec.embedding_model.sample_rate_hz != sample_rate {
                log::warn!(
                    "Classifier {} expects {} Hz embeddings but audio is loaded at {} Hz",
                    spec.name,
                    spec.embedding_model.sample_rate_hz,
                    sample_rate
                );
            }
        }

        log::info!(
            "Inference orchestrator ready with {} classifier(s)",
            classifiers.len()
        );

        Ok(Self {
            classifiers,
            loader,
            runtime,
            extractors: HashMap::new(),
            heads: HashMap::new(),
            embeddings: HashMap::new(),
        })
    }

    pub fn classifiers(&self) -> &[ClassifierSpec] {
        &self.classifiers
    }

    /// Sample rate every item is loaded at (first classifier's embedding model)
    pub fn sample_rate(&self) -> u32 {
        self.classifiers
            .first()
            .map(|c| c.embedding_model.sample_rate_hz)
            .unwrap_or_default()
    }

    /// Number of extractor handles constructed so far
    pub fn loaded_extractors(&self) -> usize {
        self.extractors.len()
    }

    /// Number of classifier handles constructed so far
    pub fn loaded_classifiers(&self) -> usize {
        self.heads.len()
    }

    /// Embeddings currently held for the item in progress
    pub fn cached_embeddings(&self) -> usize {
        self.embeddings.len()
    }

    /// Run every classifier over one audio file.
    ///
    /// Fails only when the audio itself cannot be loaded. Individual classifier
    /// failures are reported in [`ItemAnalysis::failures`].
    pub fn analyze_one(&mut self, audio_path: &Path) -> Result<ItemAnalysis, InferenceError> {
        if !audio_path.exists() {
            return Err(InferenceError::AudioNotFound(audio_path.to_path_buf()));
        }

        let sample_rate = self.sample_rate();
        let samples = self.loader.load(audio_path, sample_rate)?;
        let duration = duration_seconds(samples.len(), sample_rate);
        log::debug!("Loaded {:?}: {:.2}s at {} Hz", audio_path, duration, sample_rate);

        let mut predictions = Vec::with_capacity(self.classifiers.len());
        let mut failures = Vec::new();

        for spec in &self.classifiers {
            let result = run_classifier(
                &self.runtime,
                &mut self.extractors,
                &mut self.heads,
                &mut self.embeddings,
                audio_path,
                &samples,
                spec,
            );
            match result {
                Ok(record) => {
                    log::debug!(
                        "{}: {} segment(s) for {:?}",
                        spec.name,
                        record.segment_count,
                        audio_path
                    );
                    predictions.push(record);
                }
                Err(e) => {
                    log::error!("Classifier {} failed on {:?}: {}", spec.name, audio_path, e);
                    failures.push(ClassifierFailure {
                        classifier: spec.name.clone(),
                        error: e,
                    });
                }
            }
        }

        self.embeddings.clear();

        Ok(ItemAnalysis {
            record: AudioAnalysisRecord {
                audio_path: audio_path.to_path_buf(),
                duration_seconds: duration,
                sample_rate_hz: sample_rate,
                predictions,
            },
            failures,
        })
    }

    /// Analyse `paths` in order, recording each outcome in `aggregator`.
    ///
    /// `progress` is called with a 1-based index before each item.
    pub fn analyze_batch<F>(
        &mut self,
        paths: &[PathBuf],
        aggregator: &mut ResultAggregator,
        mut progress: F,
    ) where
        F: FnMut(usize, usize, &Path),
    {
        let total = paths.len();
        for (i, path) in paths.iter().enumerate() {
            progress(i + 1, total, path);

            match self.analyze_one(path) {
                Ok(analysis) => aggregator.append(analysis.record),
                Err(e) => aggregator.append_failure(path, &e.to_string()),
            }
        }
    }
}

fn run_classifier<R: ModelRuntime>(
    runtime: &R,
    extractors: &mut HashMap<String, R::Extractor>,
    heads: &mut HashMap<PathBuf, R::Classifier>,
    embeddings: &mut HashMap<(PathBuf, String), Array2<f32>>,
    audio_path: &Path,
    samples: &[f32],
    spec: &ClassifierSpec,
) -> Result<PredictionRecord, InferenceError> {
    let model = &spec.embedding_model;
    let key = (audio_path.to_path_buf(), model.name.clone());

    let features = match embeddings.entry(key) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            let extractor = match extractors.entry(model.name.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    log::info!("Loading embedding model: {}", model.name);
                    e.insert(runtime.load_extractor(model)?)
                }
            };
            let features = extractor.extract(samples)?;
            log::debug!(
                "Extracted {} x {} embeddings with {}",
                features.nrows(),
                features.ncols(),
                model.name
            );
            entry.insert(features)
        }
    };

    let head = match heads.entry(spec.artifact_path.clone()) {
        Entry::Occupied(e) => e.into_mut(),
        Entry::Vacant(e) => {
            log::info!("Loading classifier: {}", spec.name);
            e.insert(runtime.load_classifier(spec)?)
        }
    };

    let predictions = head.predict(features)?;
    if predictions.nrows() > 0 && predictions.ncols() != spec.class_labels.len() {
        return Err(InferenceError::WidthMismatch {
            model: spec.name.clone(),
            expected: spec.class_labels.len(),
            actual: predictions.ncols(),
        });
    }

    Ok(PredictionRecord::from_matrix(spec, &predictions))
}
