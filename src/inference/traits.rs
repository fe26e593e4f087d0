//! Model execution traits - allow swapping inference backends and test doubles

use crate::error::InferenceError;
use crate::model::{ClassifierSpec, EmbeddingModelSpec};
use ndarray::Array2;

/// A loaded feature extractor
pub trait EmbeddingExtractor {
    /// Mono samples at the model's sample rate -> one embedding row per segment
    fn extract(&mut self, samples: &[f32]) -> Result<Array2<f32>, InferenceError>;
}

/// A loaded classification head
pub trait ClassifierHead {
    /// Segments x embedding dims -> segments x classes
    fn predict(&mut self, embeddings: &Array2<f32>) -> Result<Array2<f32>, InferenceError>;
}

/// Constructs model handles from resolved specs
pub trait ModelRuntime {
    type Extractor: EmbeddingExtractor;
    type Classifier: ClassifierHead;

    fn load_extractor(&self, spec: &EmbeddingModelSpec) -> Result<Self::Extractor, InferenceError>;

    fn load_classifier(&self, spec: &ClassifierSpec) -> Result<Self::Classifier, InferenceError>;

    /// File extension of the graph files this runtime reads
    fn artifact_extension(&self) -> &'static str;
}
