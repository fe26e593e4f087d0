//! Model execution: runtime traits, the caching orchestrator and backends

mod orchestrator;
mod traits;

#[cfg(feature = "onnx")]
mod melspec;
#[cfg(feature = "onnx")]
mod onnx;

pub use orchestrator::{ClassifierFailure, InferenceOrchestrator, ItemAnalysis};
pub use traits::{ClassifierHead, EmbeddingExtractor, ModelRuntime};

#[cfg(feature = "onnx")]
pub use melspec::{extract_patches, MelFrontEnd};
#[cfg(feature = "onnx")]
pub use onnx::{OnnxClassifier, OnnxExtractor, OnnxRuntime};
