//! Tempo-aware 16-bar phrase aggregation

mod engine;
mod postprocess;

pub use engine::{
    aggregate_phrases, chunk_size, fallback_segment_duration, hop_duration, phrase_duration,
    segment_duration_from_shape, segments_per_phrase, PhraseAggregationResult, PhraseTiming,
    BARS_PER_PHRASE, BEATS_PER_BAR, PATCHES_PER_SECOND, SEGMENT_OVERLAP,
};
pub use postprocess::{
    AudioPhraseSummary, ModelPhraseSummary, PhrasePostprocessor, PostprocessSummary,
};
