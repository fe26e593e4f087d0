//! Data model shared by the registry, the orchestrator and the phrase pass
//!
//! Resolved model specs, in-memory analysis records, and the persisted
//! session format.

mod prediction;
mod scores;
mod session;
mod spec;

pub use prediction::{AudioAnalysisRecord, PredictionRecord};
pub use scores::LabelScores;
pub use session::{
    round_to, AudioResult, ModelResult, PhraseAugmentedPrediction, RawPrediction, SessionRecord,
};
pub use spec::{
    AlgorithmFamily, AlgorithmKind, ClassifierMetadata, ClassifierSpec, EmbeddingModelSpec,
    ModelBackend,
};
