//! ONNX Runtime backend
//!
//! Embedding models take mel-spectrogram patches and emit one embedding row
//! per patch. Classification heads take the whole embedding matrix in one run.

use super::melspec::{extract_patches, MelFrontEnd, N_BANDS};
use super::traits::{ClassifierHead, EmbeddingExtractor, ModelRuntime};
use crate::error::InferenceError;
use crate::model::{ClassifierSpec, EmbeddingModelSpec, ModelBackend};
use ndarray::{Array2, Array3};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Patch length used when the descriptor publishes no usable input shape
const DEFAULT_PATCH_FRAMES: usize = 128;

/// Builds ONNX sessions for `.onnx` artifacts
#[derive(Debug, Clone, Copy)]
pub struct OnnxRuntime {
    intra_threads: usize,
}

impl Default for OnnxRuntime {
    fn default() -> Self {
        Self { intra_threads: 1 }
    }
}

impl OnnxRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads.max(1);
        self
    }

    fn session(&self, model: &str, path: &Path) -> Result<Session, InferenceError> {
        Session::builder()
            .and_then(|b| b.with_intra_threads(self.intra_threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| InferenceError::Backend {
                model: model.to_string(),
                message: e.to_string(),
            })
    }
}

impl ModelRuntime for OnnxRuntime {
    type Extractor = OnnxExtractor;
    type Classifier = OnnxClassifier;

    fn load_extractor(&self, spec: &EmbeddingModelSpec) -> Result<OnnxExtractor, InferenceError> {
        let backend = ModelBackend::for_extractor(spec)?;
        let input = match &backend {
            ModelBackend::MusiCnn { input, .. } | ModelBackend::EffnetDiscogs { input, .. } => {
                input.clone().unwrap_or_else(|| "melspectrogram".to_string())
            }
            ModelBackend::Predict2D { input, .. } => input.clone(),
        };

        let (patch_frames, batched) = patch_layout(spec.input_shape.as_deref());
        log::debug!(
            "{}: {} frames per patch ({})",
            spec.name,
            patch_frames,
            if batched { "batched" } else { "unbatched" }
        );

        Ok(OnnxExtractor {
            name: spec.name.clone(),
            session: self.session(&spec.name, backend.graph())?,
            input,
            output: backend.output().to_string(),
            patch_frames,
            batched,
            front_end: MelFrontEnd::new(spec.sample_rate_hz),
        })
    }

    fn load_classifier(&self, spec: &ClassifierSpec) -> Result<OnnxClassifier, InferenceError> {
        let backend = ModelBackend::for_classifier(spec)?;
        let input = match &backend {
            ModelBackend::Predict2D { input, .. } => input.clone(),
            _ => spec.input_node_id.clone(),
        };

        Ok(OnnxClassifier {
            name: spec.name.clone(),
            session: self.session(&spec.name, backend.graph())?,
            input,
            output: backend.output().to_string(),
        })
    }

    fn artifact_extension(&self) -> &'static str {
        "onnx"
    }
}

/// Frames per patch and whether the graph takes a leading batch axis
fn patch_layout(shape: Option<&[i64]>) -> (usize, bool) {
    let frames = |d: i64| if d > 0 { d as usize } else { DEFAULT_PATCH_FRAMES };
    match shape {
        Some([_, frames_dim, _]) => (frames(*frames_dim), true),
        Some([frames_dim, _]) => (frames(*frames_dim), false),
        _ => (DEFAULT_PATCH_FRAMES, true),
    }
}

pub struct OnnxExtractor {
    name: String,
    session: Session,
    input: String,
    output: String,
    patch_frames: usize,
    batched: bool,
    front_end: MelFrontEnd,
}

impl OnnxExtractor {
    fn extraction_error(&self, message: impl Into<String>) -> InferenceError {
        InferenceError::Extraction {
            model: self.name.clone(),
            message: message.into(),
        }
    }
}

impl EmbeddingExtractor for OnnxExtractor {
    fn extract(&mut self, samples: &[f32]) -> Result<Array2<f32>, InferenceError> {
        let frames = self
            .front_end
            .compute(samples)
            .map_err(|e| self.extraction_error(e))?;
        let patches = extract_patches(&frames, self.patch_frames);
        log::debug!(
            "{}: {} patch(es) from {} mel frames",
            self.name,
            patches.len(),
            frames.len()
        );

        let mut rows: Vec<f32> = Vec::new();
        let mut dims = 0;

        for patch in &patches {
            let flat: Vec<f32> = patch.iter().flatten().copied().collect();
            let tensor = if self.batched {
                let input = Array3::from_shape_vec((1, patch.len(), N_BANDS), flat)
                    .map_err(|e| self.extraction_error(format!("input shape error: {}", e)))?;
                Tensor::from_array(input)
            } else {
                let input = Array2::from_shape_vec((patch.len(), N_BANDS), flat)
                    .map_err(|e| self.extraction_error(format!("input shape error: {}", e)))?;
                Tensor::from_array(input)
            }
            .map_err(|e| self.extraction_error(format!("tensor creation error: {}", e)))?;

            let embedding = {
                let outputs = self
                    .session
                    .run(ort::inputs![self.input.as_str() => tensor])
                    .map_err(|e| InferenceError::Extraction {
                        model: self.name.clone(),
                        message: e.to_string(),
                    })?;
                let value = outputs
                    .iter()
                    .find(|(name, _)| *name == self.output)
                    .or_else(|| outputs.iter().last())
                    .map(|(_, v)| v)
                    .ok_or_else(|| InferenceError::Extraction {
                        model: self.name.clone(),
                        message: "model produced no output".to_string(),
                    })?;
                let (_shape, data) =
                    value
                        .try_extract_tensor::<f32>()
                        .map_err(|e| InferenceError::Extraction {
                            model: self.name.clone(),
                            message: e.to_string(),
                        })?;
                data.to_vec()
            };

            if dims == 0 {
                dims = embedding.len();
            } else if embedding.len() != dims {
                return Err(self.extraction_error(format!(
                    "embedding width changed from {} to {}",
                    dims,
                    embedding.len()
                )));
            }
            rows.extend_from_slice(&embedding);
        }

        Array2::from_shape_vec((patches.len(), dims), rows)
            .map_err(|e| self.extraction_error(e.to_string()))
    }
}

pub struct OnnxClassifier {
    name: String,
    session: Session,
    input: String,
    output: String,
}

impl ClassifierHead for OnnxClassifier {
    fn predict(&mut self, embeddings: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        let classification_error = |message: String| InferenceError::Classification {
            model: self.name.clone(),
            message,
        };

        let segments = embeddings.nrows();
        if segments == 0 {
            return Ok(Array2::zeros((0, 0)));
        }

        let tensor = Tensor::from_array(embeddings.clone())
            .map_err(|e| classification_error(format!("tensor creation error: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input.as_str() => tensor])
            .map_err(|e| InferenceError::Classification {
                model: self.name.clone(),
                message: e.to_string(),
            })?;
        let value = outputs
            .iter()
            .find(|(name, _)| *name == self.output)
            .or_else(|| outputs.iter().next())
            .map(|(_, v)| v)
            .ok_or_else(|| InferenceError::Classification {
                model: self.name.clone(),
                message: "model produced no output".to_string(),
            })?;
        let (_shape, data) =
            value
                .try_extract_tensor::<f32>()
                .map_err(|e| InferenceError::Classification {
                    model: self.name.clone(),
                    message: e.to_string(),
                })?;

        if data.len() % segments != 0 {
            return Err(InferenceError::Classification {
                model: self.name.clone(),
                message: format!("{} values cannot split into {} rows", data.len(), segments),
            });
        }

        Array2::from_shape_vec((segments, data.len() / segments), data.to_vec()).map_err(|e| {
            InferenceError::Classification {
                model: self.name.clone(),
                message: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_layout_from_shape() {
        assert_eq!(patch_layout(Some(&[64, 128, 96])), (128, true));
        assert_eq!(patch_layout(Some(&[187, 96])), (187, false));
        assert_eq!(patch_layout(Some(&[-1, -1, 96])), (DEFAULT_PATCH_FRAMES, true));
        assert_eq!(patch_layout(None), (DEFAULT_PATCH_FRAMES, true));
    }
}
