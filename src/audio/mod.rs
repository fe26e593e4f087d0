//! Audio input: file discovery, decoding and tempo estimation

mod decoder;
mod discovery;
mod tempo;
mod traits;

pub use decoder::{decode_to_mono, resample_mono, SymphoniaLoader};
pub use discovery::{discover_audio_files, is_supported_audio};
pub use tempo::{fold_bpm, StratumTempoEstimator};
pub use traits::{duration_seconds, AudioLoader, TempoEstimator};
