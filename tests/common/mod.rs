//! Shared fixtures: on-disk model trees and spy collaborators

#![allow(dead_code)]

use ndarray::Array2;
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use technotaggr::audio::AudioLoader;
use technotaggr::error::InferenceError;
use technotaggr::inference::{ClassifierHead, EmbeddingExtractor, ModelRuntime};
use technotaggr::model::{
    AlgorithmFamily, AlgorithmKind, ClassifierMetadata, ClassifierSpec, EmbeddingModelSpec,
};

pub const MUSICNN: &str = "TensorflowPredictMusiCNN";
pub const EFFNET: &str = "TensorflowPredictEffnetDiscogs";

/// Write `<root>/feature-extractors/<family>/<name>.json` plus its graph file
pub fn write_embedding(root: &Path, family: &str, name: &str, algorithm: &str, shape: &[i64]) -> PathBuf {
    let dir = root.join("feature-extractors").join(family);
    fs::create_dir_all(&dir).unwrap();
    let descriptor = json!({
        "name": name,
        "inference": { "algorithm": algorithm, "sample_rate": 16000 },
        "schema": {
            "inputs": [{ "name": "model/Placeholder", "shape": shape }],
            "outputs": [
                { "name": "model/Sigmoid", "output_purpose": "predictions" },
                { "name": "model/dense/BiasAdd", "output_purpose": "embeddings" }
            ]
        }
    });
    fs::write(dir.join(format!("{}.json", name)), descriptor.to_string()).unwrap();
    let artifact = dir.join(format!("{}.pb", name));
    fs::write(&artifact, b"graph").unwrap();
    artifact
}

/// Write `<root>/classification-heads/<id>/<id>.json` plus its graph file
pub fn write_classifier(
    root: &Path,
    id: &str,
    classes: &[&str],
    embedding_algorithm: &str,
    embedding_name: &str,
) -> PathBuf {
    let descriptor = json!({
        "name": id,
        "version": 1,
        "description": format!("{} classifier", id),
        "classes": classes,
        "author": "Test Author",
        "dataset": { "name": "test-set", "size": 100 },
        "inference": {
            "algorithm": "TensorflowPredict2D",
            "sample_rate": 16000,
            "embedding_model": { "algorithm": embedding_algorithm, "model_name": embedding_name }
        },
        "schema": {
            "inputs": [{ "name": "model/Placeholder", "shape": [1, 200] }],
            "outputs": [{ "name": "model/Softmax", "output_purpose": "predictions" }]
        }
    });
    write_classifier_json(root, id, &descriptor)
}

/// Write an arbitrary classifier descriptor plus its graph file
pub fn write_classifier_json(root: &Path, id: &str, descriptor: &serde_json::Value) -> PathBuf {
    let dir = root.join("classification-heads").join(id);
    fs::create_dir_all(&dir).unwrap();
    let json_path = dir.join(format!("{}.json", id));
    fs::write(&json_path, descriptor.to_string()).unwrap();
    fs::write(dir.join(format!("{}.pb", id)), b"graph").unwrap();
    json_path
}

/// In-memory embedding spec for orchestrator tests
pub fn embedding_spec(name: &str) -> Arc<EmbeddingModelSpec> {
    Arc::new(EmbeddingModelSpec {
        name: name.to_string(),
        family: AlgorithmFamily::MusiCnn,
        algorithm: AlgorithmKind::TensorflowPredictMusiCnn,
        artifact_path: PathBuf::from(format!("/models/{}.pb", name)),
        sample_rate_hz: 16000,
        output_node_id: "model/dense/BiasAdd".to_string(),
        input_node_id: Some("model/Placeholder".to_string()),
        input_shape: Some(vec![187, 96]),
    })
}

/// In-memory classifier spec for orchestrator tests
pub fn classifier_spec(name: &str, classes: &[&str], embedding: &Arc<EmbeddingModelSpec>) -> ClassifierSpec {
    ClassifierSpec {
        name: name.to_string(),
        version: "1".to_string(),
        description: String::new(),
        algorithm: AlgorithmKind::TensorflowPredict2D,
        artifact_path: PathBuf::from(format!("/models/{}.pb", name)),
        sample_rate_hz: 16000,
        class_labels: classes.iter().map(|c| c.to_string()).collect(),
        input_node_id: "model/Placeholder".to_string(),
        output_node_id: "model/Softmax".to_string(),
        embedding_model: Arc::clone(embedding),
        metadata: ClassifierMetadata::default(),
    }
}

/// Loader returning a fixed-length silent signal for any existing path
pub struct FakeLoader {
    pub samples: usize,
    pub loads: Rc<RefCell<usize>>,
}

impl FakeLoader {
    pub fn new(samples: usize) -> Self {
        Self {
            samples,
            loads: Rc::new(RefCell::new(0)),
        }
    }
}

impl AudioLoader for FakeLoader {
    fn load(&self, path: &Path, _sample_rate: u32) -> Result<Vec<f32>, InferenceError> {
        if !path.exists() {
            return Err(InferenceError::AudioNotFound(path.to_path_buf()));
        }
        *self.loads.borrow_mut() += 1;
        Ok(vec![0.0; self.samples])
    }
}

/// Call counters shared between a spy runtime and the test
#[derive(Default)]
pub struct Calls {
    pub extractor_loads: usize,
    pub classifier_loads: usize,
    /// Extraction calls per embedding-model name
    pub extractions: HashMap<String, usize>,
    pub predictions: usize,
}

/// Runtime producing deterministic matrices and counting every call
pub struct SpyRuntime {
    pub calls: Rc<RefCell<Calls>>,
    pub segments: usize,
    pub dims: usize,
    /// Classifier names whose predict call fails
    pub failing: Vec<String>,
    /// Classifier name -> output width override
    pub widths: HashMap<String, usize>,
}

impl SpyRuntime {
    pub fn new(segments: usize) -> Self {
        Self {
            calls: Rc::new(RefCell::new(Calls::default())),
            segments,
            dims: 4,
            failing: Vec::new(),
            widths: HashMap::new(),
        }
    }
}

pub struct SpyExtractor {
    name: String,
    segments: usize,
    dims: usize,
    calls: Rc<RefCell<Calls>>,
}

impl EmbeddingExtractor for SpyExtractor {
    fn extract(&mut self, _samples: &[f32]) -> Result<Array2<f32>, InferenceError> {
        *self
            .calls
            .borrow_mut()
            .extractions
            .entry(self.name.clone())
            .or_insert(0) += 1;
        Ok(Array2::from_elem((self.segments, self.dims), 1.0))
    }
}

pub struct SpyClassifier {
    name: String,
    width: usize,
    fails: bool,
    calls: Rc<RefCell<Calls>>,
}

impl ClassifierHead for SpyClassifier {
    fn predict(&mut self, embeddings: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        self.calls.borrow_mut().predictions += 1;
        if self.fails {
            return Err(InferenceError::Classification {
                model: self.name.clone(),
                message: "graph execution failed".to_string(),
            });
        }
        let rows = embeddings.nrows();
        let width = self.width;
        // Row i puts weight on class i % width
        Ok(Array2::from_shape_fn((rows, width), |(i, j)| {
            if j == i % width {
                0.75
            } else {
                0.25 / (width.max(2) - 1) as f32
            }
        }))
    }
}

impl ModelRuntime for SpyRuntime {
    type Extractor = SpyExtractor;
    type Classifier = SpyClassifier;

    fn load_extractor(&self, spec: &EmbeddingModelSpec) -> Result<SpyExtractor, InferenceError> {
        self.calls.borrow_mut().extractor_loads += 1;
        Ok(SpyExtractor {
            name: spec.name.clone(),
            segments: self.segments,
            dims: self.dims,
            calls: Rc::clone(&self.calls),
        })
    }

    fn load_classifier(&self, spec: &ClassifierSpec) -> Result<SpyClassifier, InferenceError> {
        self.calls.borrow_mut().classifier_loads += 1;
        Ok(SpyClassifier {
            name: spec.name.clone(),
            width: self
                .widths
                .get(&spec.name)
                .copied()
                .unwrap_or(spec.class_labels.len()),
            fails: self.failing.contains(&spec.name),
            calls: Rc::clone(&self.calls),
        })
    }

    fn artifact_extension(&self) -> &'static str {
        "pb"
    }
}
