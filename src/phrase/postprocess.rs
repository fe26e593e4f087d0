//! Phrase post-processing pass over a persisted session

use super::engine::{
    aggregate_phrases, fallback_segment_duration, phrase_duration, segment_duration_from_shape,
    PhraseTiming,
};
use crate::audio::TempoEstimator;
use crate::error::{PersistenceError, PhraseError};
use crate::model::{
    round_to, AudioResult, ModelResult, PhraseAugmentedPrediction, RawPrediction, SessionRecord,
};
use crate::registry::embedding_input_shape;
use crate::results::write_json_atomic;
use std::path::{Path, PathBuf};

/// Phrase details for one model on one audio item
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPhraseSummary {
    pub model_name: String,
    pub embedding_model: String,
    pub segment_duration_seconds: f64,
    pub num_segments: usize,
    pub segments_per_phrase: f64,
    pub num_phrases: usize,
}

/// Phrase details for one audio item
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPhraseSummary {
    pub audio_file: String,
    pub audio_duration_seconds: f64,
    pub bpm: f64,
    pub phrase_duration_seconds: f64,
    pub models: Vec<ModelPhraseSummary>,
}

/// Outcome of a post-processing run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostprocessSummary {
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub results: Vec<AudioPhraseSummary>,
}

impl PostprocessSummary {
    /// Print counts, then per file the tempo and one block per embedding model
    pub fn print(&self) {
        let rule = "=".repeat(70);

        println!("\n{}", rule);
        println!("TechnoTaggr Post-Processing Summary");
        println!("{}", rule);
        println!("Total files:      {}", self.total_files);
        println!("Successful:       {}", self.successful_files);
        println!("Failed:           {}", self.failed_files);
        println!("{}", "-".repeat(70));

        for result in &self.results {
            let name = Path::new(&result.audio_file)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| result.audio_file.clone());
            println!("\n  {}", name);
            println!("    Audio Duration:      {:.1}s", result.audio_duration_seconds);
            println!("    BPM:                 {:.1}", result.bpm);
            println!("    16-Bar Phrase:       {:.2}s", result.phrase_duration_seconds);

            for (embedding, models) in group_by_embedding(&result.models) {
                let first = models[0];
                let names: Vec<&str> = models.iter().map(|m| m.model_name.as_str()).collect();
                println!("\n    Embedding: {}", embedding);
                println!("      Models:            {}", names.join(", "));
                println!("      Segment Duration:  {:.3}s", first.segment_duration_seconds);
                println!("      Num Segments:      {}", first.num_segments);
                println!("      Segments/Phrase:   {:.1}", first.segments_per_phrase);
                println!("      Num 16-Bar Phrases:{}", first.num_phrases);
            }
        }

        println!("\n{}", rule);
    }
}

/// Group models by embedding model, keeping first-seen order
fn group_by_embedding(models: &[ModelPhraseSummary]) -> Vec<(&str, Vec<&ModelPhraseSummary>)> {
    let mut groups: Vec<(&str, Vec<&ModelPhraseSummary>)> = Vec::new();
    for model in models {
        match groups.iter_mut().find(|(name, _)| *name == model.embedding_model) {
            Some((_, members)) => members.push(model),
            None => groups.push((model.embedding_model.as_str(), vec![model])),
        }
    }
    groups
}

/// Adds 16-bar phrase predictions to every item of a session
pub struct PhrasePostprocessor<T: TempoEstimator> {
    estimator: T,
    audio_base_path: PathBuf,
}

impl<T: TempoEstimator> PhrasePostprocessor<T> {
    /// Relative audio paths resolve against `audio_base_path`
    pub fn new(estimator: T, audio_base_path: PathBuf) -> Self {
        Self {
            estimator,
            audio_base_path,
        }
    }

    fn resolve_audio(&self, audio_file: &str) -> PathBuf {
        let path = Path::new(audio_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.audio_base_path.join(path)
        }
    }

    /// Augment one item in place.
    ///
    /// On error the item is left exactly as it was.
    pub fn process_item(&self, item: &mut AudioResult) -> Result<AudioPhraseSummary, PhraseError> {
        let audio_path = self.resolve_audio(&item.audio_file);
        if !audio_path.exists() {
            return Err(PhraseError::AudioNotFound(audio_path));
        }

        let bpm = self.estimator.estimate_bpm(&audio_path)?;
        let phrase = phrase_duration(bpm)?;

        item.bpm = Some(round_to(bpm, 2));
        item.phrase_duration_seconds = Some(round_to(phrase, 3));

        let mut summary = AudioPhraseSummary {
            audio_file: item.audio_file.clone(),
            audio_duration_seconds: item.audio_duration_seconds,
            bpm: round_to(bpm, 2),
            phrase_duration_seconds: round_to(phrase, 3),
            models: Vec::new(),
        };

        let audio_duration = item.audio_duration_seconds;
        for model in item.models.iter_mut() {
            let raw = model.raw();
            if raw.num_segments == 0 || raw.segment_predictions.is_empty() {
                log::debug!("{}: no segments, leaving raw predictions", raw.model_name);
                continue;
            }

            match augment_model(raw, audio_duration, phrase) {
                Ok((augmented, info)) => {
                    *model = ModelResult::PhraseAugmented(augmented);
                    summary.models.push(info);
                }
                Err(e) => {
                    log::warn!("Skipping phrase aggregation: {}", e);
                    if model.is_phrase_augmented() {
                        *model = ModelResult::Raw(raw.clone());
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Augment every item of `session`, counting items whose tempo could be used
    pub fn process_session(&self, session: &mut SessionRecord) -> PostprocessSummary {
        let total = session.results.len();
        let mut summary = PostprocessSummary {
            total_files: total,
            ..Default::default()
        };

        for (i, item) in session.results.iter_mut().enumerate() {
            let name = Path::new(&item.audio_file)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| item.audio_file.clone());
            log::info!("[{}/{}] Processing: {}", i + 1, total, name);

            match self.process_item(item) {
                Ok(audio_summary) => {
                    summary.successful_files += 1;
                    summary.results.push(audio_summary);
                }
                Err(PhraseError::AudioNotFound(path)) => {
                    log::warn!("Audio file not found: {:?}", path);
                    summary.failed_files += 1;
                }
                Err(e) => {
                    log::error!("Failed to post-process {}: {}", item.audio_file, e);
                    summary.failed_files += 1;
                }
            }
        }

        summary
    }

    /// Load `results_path`, augment it and write to `output_path` (or back in place)
    pub fn postprocess_file(
        &self,
        results_path: &Path,
        output_path: Option<&Path>,
    ) -> Result<(PathBuf, PostprocessSummary), PersistenceError> {
        log::info!("Post-processing results from: {:?}", results_path);

        let mut session = SessionRecord::load(results_path)?;
        let summary = self.process_session(&mut session);

        let destination = output_path.unwrap_or(results_path).to_path_buf();
        write_json_atomic(&destination, &session)?;
        log::info!("Post-processed results saved to: {:?}", destination);

        Ok((destination, summary))
    }
}

/// Window length for a model: descriptor shape first, then duration / count
fn resolve_segment_duration(raw: &RawPrediction, audio_duration: f64) -> Result<f64, PhraseError> {
    let from_shape = embedding_input_shape(Path::new(&raw.embedding_model_path))
        .and_then(|shape| segment_duration_from_shape(&shape));
    if let Some(seconds) = from_shape {
        log::debug!("{}: segment duration {:.3}s from descriptor", raw.embedding_model, seconds);
        return Ok(seconds);
    }

    let seconds = fallback_segment_duration(audio_duration, raw.num_segments).ok_or_else(|| {
        PhraseError::NoSegmentDuration {
            model: raw.model_name.clone(),
        }
    })?;
    log::warn!(
        "Using fallback segment duration for {}: {:.3}s",
        raw.model_name,
        seconds
    );
    Ok(seconds)
}

fn augment_model(
    raw: &RawPrediction,
    audio_duration: f64,
    phrase: f64,
) -> Result<(PhraseAugmentedPrediction, ModelPhraseSummary), PhraseError> {
    let segment_duration = resolve_segment_duration(raw, audio_duration)?;
    let timing = PhraseTiming::new(segment_duration, phrase);

    log::debug!(
        "Model {}: {} segments, {:.3}s segment duration, {:.3}s hop duration, {:.2} segments per 16-bar phrase",
        raw.model_name,
        raw.num_segments,
        timing.segment_duration_seconds,
        timing.hop_duration_seconds,
        timing.segments_per_phrase
    );

    let result = aggregate_phrases(
        &raw.model_name,
        &raw.segment_predictions,
        &raw.classes,
        &timing,
    )?;

    let info = ModelPhraseSummary {
        model_name: raw.model_name.clone(),
        embedding_model: raw.embedding_model.clone(),
        segment_duration_seconds: round_to(segment_duration, 3),
        num_segments: raw.num_segments,
        segments_per_phrase: round_to(timing.segments_per_phrase, 2),
        num_phrases: result.bar_predictions.len().max(1),
    };

    let augmented = PhraseAugmentedPrediction {
        raw: raw.clone(),
        bar_predictions: result.bar_predictions,
        aggregated_bar_predictions: result.aggregated_bar_predictions,
    };

    Ok((augmented, info))
}
