//! Error types for technotaggr
//!
//! Every error is attributed to the smallest unit it affects: one model
//! descriptor, one classifier run, one audio item or one save call.

use std::path::PathBuf;
use thiserror::Error;

/// Problems resolving a model descriptor. The offending classifier is skipped.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Descriptor file does not exist
    #[error("Descriptor not found: {0:?}")]
    DescriptorNotFound(PathBuf),

    /// Model artifact (graph file) could not be located
    #[error("Model artifact not found for {0}")]
    ArtifactNotFound(String),

    /// Required descriptor field missing or empty
    #[error("Missing field '{field}' in {path:?}")]
    MissingField { field: &'static str, path: PathBuf },

    /// Class label listed more than once
    #[error("Duplicate class label '{label}' in {path:?}")]
    DuplicateLabel { label: String, path: PathBuf },

    /// `schema.inputs` is empty or its first entry has no name
    #[error("No input node found in {0:?}")]
    NoInputNode(PathBuf),

    /// No output tagged with `output_purpose == "predictions"`
    #[error("No predictions output node found in {0:?}")]
    NoPredictionsOutput(PathBuf),

    /// No output tagged with `output_purpose == "embeddings"`
    #[error("No embeddings output node found in {0:?}")]
    NoEmbeddingsOutput(PathBuf),

    /// Algorithm name outside the known backend set
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Embedding algorithm with no matching feature-extractor family
    #[error("Unknown embedding algorithm family: {0}")]
    UnknownEmbeddingFamily(String),

    /// Algorithm is known but cannot serve in the requested role
    #[error("Algorithm {algorithm} cannot be used as {role}")]
    WrongRole { algorithm: String, role: &'static str },

    #[error("Failed to parse descriptor {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while loading audio or running a model
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("No classifiers configured")]
    NoClassifiers,

    #[error("Audio file not found: {0:?}")]
    AudioNotFound(PathBuf),

    #[error("Failed to decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Embedding extraction failed for {model}: {message}")]
    Extraction { model: String, message: String },

    #[error("Classifier {model} failed: {message}")]
    Classification { model: String, message: String },

    /// Output width does not match the classifier's label count
    #[error("Classifier {model} produced {actual} values per segment, expected {expected}")]
    WidthMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    /// Model could not be constructed by the runtime
    #[error("Failed to load model {model}: {message}")]
    Backend { model: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Failures writing or reading a session file. Fatal for that call.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize session: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse session file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Phrase aggregation failures. Item-level variants skip the whole item,
/// model-level variants leave that model's raw predictions untouched.
#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("BPM must be positive and finite, got {0}")]
    InvalidBpm(f64),

    #[error("Audio file not found: {0:?}")]
    AudioNotFound(PathBuf),

    #[error(transparent)]
    Tempo(#[from] TempoError),

    /// Neither the embedding descriptor nor the audio duration gives a window length
    #[error("No usable segment duration for {model}")]
    NoSegmentDuration { model: String },

    #[error("{model}: segment {row} has {actual} values, expected {expected}")]
    RaggedPredictions {
        model: String,
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Tempo estimation failures (skip phrase processing for that item)
#[derive(Debug, Error)]
pub enum TempoError {
    #[error("Failed to decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Tempo analysis failed: {0}")]
    Analysis(String),

    #[error("Could not detect BPM")]
    NotDetected,
}
