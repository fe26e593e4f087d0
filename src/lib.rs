//! TechnoTaggr - batch audio tagging
//!
//! Runs every classification head found in a model directory over a batch
//! of audio files, sharing embeddings between heads that use the same
//! feature extractor, then re-aggregates the per-window predictions into
//! tempo-aware 16-bar phrases.

pub mod audio;
pub mod config;
pub mod error;
pub mod inference;
pub mod model;
pub mod phrase;
pub mod pipeline;
pub mod registry;
pub mod results;

pub use config::{AnalyzeConfig, PostprocessConfig};
pub use pipeline::{run_postprocess, AnalysisPipeline};
