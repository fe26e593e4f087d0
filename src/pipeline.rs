//! End-to-end runs: analysis of a directory and phrase post-processing

use crate::audio::{discover_audio_files, AudioLoader, TempoEstimator};
use crate::config::{AnalyzeConfig, PostprocessConfig};
use crate::inference::{InferenceOrchestrator, ModelRuntime};
use crate::phrase::{PhrasePostprocessor, PostprocessSummary};
use crate::registry::ModelRegistry;
use crate::results::ResultAggregator;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Analysis run over one input directory
pub struct AnalysisPipeline<L: AudioLoader, R: ModelRuntime> {
    config: AnalyzeConfig,
    orchestrator: InferenceOrchestrator<L, R>,
}

impl<L: AudioLoader, R: ModelRuntime> AnalysisPipeline<L, R> {
    /// Discover classifiers under the configured models directory
    pub fn new(config: AnalyzeConfig, loader: L, runtime: R) -> Result<Self> {
        if !config.input_dir.is_dir() {
            anyhow::bail!("Input directory not found: {:?}", config.input_dir);
        }

        let registry = ModelRegistry::new(&config.models_dir)
            .with_artifact_extension(runtime.artifact_extension());
        let classifiers = registry.discover();
        if classifiers.is_empty() {
            anyhow::bail!(
                "No classifiers found in {:?}",
                config.classification_heads_dir()
            );
        }

        for spec in &classifiers {
            log::info!(
                "  {} (v{}) on {} [{} classes]",
                spec.name,
                spec.version,
                spec.embedding_model.name,
                spec.class_labels.len()
            );
        }

        let orchestrator = InferenceOrchestrator::new(classifiers, loader, runtime)?;
        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// Analyse every audio file and save the session.
    ///
    /// Returns the session file, or None when there was nothing to analyse.
    pub fn run(&mut self) -> Result<Option<PathBuf>> {
        let files = discover_audio_files(&self.config.input_dir, self.config.recursive)
            .with_context(|| format!("Failed to scan {:?}", self.config.input_dir))?;

        if files.is_empty() {
            log::warn!("No audio files found in {:?}", self.config.input_dir);
            return Ok(None);
        }

        let mut aggregator = ResultAggregator::new(
            self.config.output_dir.clone(),
            Some(self.config.input_dir.clone()),
        );

        self.orchestrator
            .analyze_batch(&files, &mut aggregator, |index, total, path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                log::info!("[{}/{}] Processing: {}", index, total, name);
            });

        let path = aggregator.save(None).context("Failed to save results")?;

        if self.config.print_summary {
            aggregator.print_summary();
        }

        Ok(Some(path))
    }
}

/// Add phrase predictions to a saved session
pub fn run_postprocess<T: TempoEstimator>(
    config: &PostprocessConfig,
    estimator: T,
) -> Result<(PathBuf, PostprocessSummary)> {
    if !config.results_path.is_file() {
        anyhow::bail!("Results file not found: {:?}", config.results_path);
    }

    let base = match &config.audio_base_path {
        Some(base) => base.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    let postprocessor = PhrasePostprocessor::new(estimator, base);
    let (path, summary) = postprocessor
        .postprocess_file(&config.results_path, config.output_path.as_deref())
        .with_context(|| format!("Failed to post-process {:?}", config.results_path))?;

    if config.print_summary {
        summary.print();
    }

    Ok((path, summary))
}
