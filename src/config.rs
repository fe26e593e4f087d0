//! Run configuration for the analyze and postprocess passes

use std::path::{Path, PathBuf};

/// Audio file extensions picked up by discovery (lowercase, no dot)
pub const SUPPORTED_FORMATS: &[&str] = &["aiff", "aif", "mp3", "wav"];

/// Classification heads live under `<models_dir>/classification-heads`
pub const CLASSIFICATION_HEADS_DIR: &str = "classification-heads";

/// Feature extractors live under `<models_dir>/feature-extractors`
pub const FEATURE_EXTRACTORS_DIR: &str = "feature-extractors";

pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_OUTPUT_DIR: &str = "technotaggr_results";

/// Default BPM folding range for tempo estimation
pub const DEFAULT_MIN_BPM: f32 = 70.0;
pub const DEFAULT_MAX_BPM: f32 = 170.0;

/// Configuration for an analysis run
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    /// Directory scanned for audio files
    pub input_dir: PathBuf,

    /// Directory the session JSON is written to
    pub output_dir: PathBuf,

    /// Root of the model tree (contains classification-heads/ and feature-extractors/)
    pub models_dir: PathBuf,

    /// Descend into subdirectories of `input_dir`
    pub recursive: bool,

    /// Print the end-of-run summary to stdout
    pub print_summary: bool,
}

impl AnalyzeConfig {
    pub fn new(input_dir: PathBuf) -> Self {
        Self {
            input_dir,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            recursive: false,
            print_summary: true,
        }
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_models_dir(mut self, models_dir: PathBuf) -> Self {
        self.models_dir = models_dir;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_summary(mut self, print_summary: bool) -> Self {
        self.print_summary = print_summary;
        self
    }

    pub fn classification_heads_dir(&self) -> PathBuf {
        self.models_dir.join(CLASSIFICATION_HEADS_DIR)
    }

    pub fn feature_extractors_dir(&self) -> PathBuf {
        self.models_dir.join(FEATURE_EXTRACTORS_DIR)
    }
}

/// Configuration for the phrase post-processing pass
#[derive(Debug, Clone)]
pub struct PostprocessConfig {
    /// Session JSON produced by an analysis run
    pub results_path: PathBuf,

    /// Where to write the augmented session (None = overwrite input)
    pub output_path: Option<PathBuf>,

    /// Base for resolving relative audio paths (None = current directory)
    pub audio_base_path: Option<PathBuf>,

    /// BPM folding range used by the tempo estimator
    pub min_bpm: f32,
    pub max_bpm: f32,

    pub print_summary: bool,
}

impl PostprocessConfig {
    pub fn new(results_path: PathBuf) -> Self {
        Self {
            results_path,
            output_path: None,
            audio_base_path: None,
            min_bpm: DEFAULT_MIN_BPM,
            max_bpm: DEFAULT_MAX_BPM,
            print_summary: true,
        }
    }

    pub fn with_output(mut self, output_path: Option<PathBuf>) -> Self {
        self.output_path = output_path;
        self
    }

    pub fn with_audio_base_path(mut self, base: Option<PathBuf>) -> Self {
        self.audio_base_path = base;
        self
    }

    pub fn with_bpm_range(mut self, min: f32, max: f32) -> Self {
        self.min_bpm = min;
        self.max_bpm = max;
        self
    }

    pub fn with_summary(mut self, print_summary: bool) -> Self {
        self.print_summary = print_summary;
        self
    }

    /// Final destination of the augmented session
    pub fn destination(&self) -> &Path {
        self.output_path.as_deref().unwrap_or(&self.results_path)
    }
}
