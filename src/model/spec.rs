use crate::error::RegistryError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Backend algorithm named in a descriptor's `inference.algorithm`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    /// MusiCNN feature extractor (raw audio -> embeddings)
    TensorflowPredictMusiCnn,
    /// Discogs EfficientNet feature extractor (raw audio -> embeddings)
    TensorflowPredictEffnetDiscogs,
    /// Generic 2-D head (embeddings -> class probabilities)
    TensorflowPredict2D,
}

impl AlgorithmKind {
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::TensorflowPredictMusiCnn => "TensorflowPredictMusiCNN",
            AlgorithmKind::TensorflowPredictEffnetDiscogs => "TensorflowPredictEffnetDiscogs",
            AlgorithmKind::TensorflowPredict2D => "TensorflowPredict2D",
        }
    }

    /// Whether this algorithm consumes raw audio
    pub fn is_extractor(&self) -> bool {
        !matches!(self, AlgorithmKind::TensorflowPredict2D)
    }
}

impl FromStr for AlgorithmKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TensorflowPredictMusiCNN" => Ok(AlgorithmKind::TensorflowPredictMusiCnn),
            "TensorflowPredictEffnetDiscogs" => Ok(AlgorithmKind::TensorflowPredictEffnetDiscogs),
            "TensorflowPredict2D" => Ok(AlgorithmKind::TensorflowPredict2D),
            other => Err(RegistryError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Feature-extractor family, i.e. the subdirectory under `feature-extractors/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlgorithmFamily {
    MusiCnn,
    DiscogsEffnet,
}

impl AlgorithmFamily {
    /// Match an embedding algorithm name against the family keywords
    pub fn from_algorithm(algorithm: &str) -> Result<Self, RegistryError> {
        if algorithm.contains("MusiCNN") {
            Ok(AlgorithmFamily::MusiCnn)
        } else if algorithm.contains("Effnet") {
            Ok(AlgorithmFamily::DiscogsEffnet)
        } else {
            Err(RegistryError::UnknownEmbeddingFamily(algorithm.to_string()))
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            AlgorithmFamily::MusiCnn => "musicnn",
            AlgorithmFamily::DiscogsEffnet => "discogs-effnet",
        }
    }
}

/// A resolved feature extractor. Immutable once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingModelSpec {
    pub name: String,
    pub family: AlgorithmFamily,
    pub algorithm: AlgorithmKind,
    pub artifact_path: PathBuf,
    pub sample_rate_hz: u32,
    pub output_node_id: String,
    /// First declared input, when the descriptor names one
    pub input_node_id: Option<String>,
    /// `schema.inputs[0].shape`, when published
    pub input_shape: Option<Vec<i64>>,
}

/// Optional provenance fields copied from a classifier descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierMetadata {
    pub author: Option<String>,
    pub email: Option<String>,
    pub release_date: Option<String>,
    pub framework: Option<String>,
    pub framework_version: Option<String>,
    pub dataset: Option<String>,
}

impl ClassifierMetadata {
    /// Flatten into a key/value map, omitting absent fields
    pub fn to_map(&self) -> BTreeMap<&'static str, &str> {
        [
            ("author", &self.author),
            ("email", &self.email),
            ("release_date", &self.release_date),
            ("framework", &self.framework),
            ("framework_version", &self.framework_version),
            ("dataset", &self.dataset),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

/// A resolved classification head
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSpec {
    pub name: String,
    pub version: String,
    pub description: String,
    pub algorithm: AlgorithmKind,
    pub artifact_path: PathBuf,
    pub sample_rate_hz: u32,
    /// Ordered, unique labels; prediction width must equal this length
    pub class_labels: Vec<String>,
    pub input_node_id: String,
    pub output_node_id: String,
    /// Shared with every other classifier referencing the same model
    pub embedding_model: Arc<EmbeddingModelSpec>,
    pub metadata: ClassifierMetadata,
}

/// Construction parameters for one executable model, per algorithm kind
#[derive(Debug, Clone, PartialEq)]
pub enum ModelBackend {
    MusiCnn {
        graph: PathBuf,
        input: Option<String>,
        output: String,
    },
    EffnetDiscogs {
        graph: PathBuf,
        input: Option<String>,
        output: String,
    },
    Predict2D {
        graph: PathBuf,
        input: String,
        output: String,
    },
}

impl ModelBackend {
    pub fn for_extractor(spec: &EmbeddingModelSpec) -> Result<Self, RegistryError> {
        let graph = spec.artifact_path.clone();
        let input = spec.input_node_id.clone();
        let output = spec.output_node_id.clone();
        match spec.algorithm {
            AlgorithmKind::TensorflowPredictMusiCnn => Ok(ModelBackend::MusiCnn {
                graph,
                input,
                output,
            }),
            AlgorithmKind::TensorflowPredictEffnetDiscogs => Ok(ModelBackend::EffnetDiscogs {
                graph,
                input,
                output,
            }),
            AlgorithmKind::TensorflowPredict2D => Err(RegistryError::WrongRole {
                algorithm: spec.algorithm.to_string(),
                role: "an embedding model",
            }),
        }
    }

    pub fn for_classifier(spec: &ClassifierSpec) -> Result<Self, RegistryError> {
        match spec.algorithm {
            AlgorithmKind::TensorflowPredict2D => Ok(ModelBackend::Predict2D {
                graph: spec.artifact_path.clone(),
                input: spec.input_node_id.clone(),
                output: spec.output_node_id.clone(),
            }),
            other => Err(RegistryError::WrongRole {
                algorithm: other.to_string(),
                role: "a classification head",
            }),
        }
    }

    pub fn graph(&self) -> &PathBuf {
        match self {
            ModelBackend::MusiCnn { graph, .. }
            | ModelBackend::EffnetDiscogs { graph, .. }
            | ModelBackend::Predict2D { graph, .. } => graph,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            ModelBackend::MusiCnn { output, .. }
            | ModelBackend::EffnetDiscogs { output, .. }
            | ModelBackend::Predict2D { output, .. } => output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(algorithm: AlgorithmKind) -> EmbeddingModelSpec {
        EmbeddingModelSpec {
            name: "msd-musicnn-1".to_string(),
            family: AlgorithmFamily::MusiCnn,
            algorithm,
            artifact_path: PathBuf::from("/models/msd-musicnn-1.pb"),
            sample_rate_hz: 16000,
            output_node_id: "model/dense/BiasAdd".to_string(),
            input_node_id: None,
            input_shape: None,
        }
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(
            "TensorflowPredict2D".parse::<AlgorithmKind>().unwrap(),
            AlgorithmKind::TensorflowPredict2D
        );
        assert!(matches!(
            "TensorflowPredictVGGish".parse::<AlgorithmKind>(),
            Err(RegistryError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_family_keywords() {
        assert_eq!(
            AlgorithmFamily::from_algorithm("TensorflowPredictMusiCNN").unwrap(),
            AlgorithmFamily::MusiCnn
        );
        assert_eq!(
            AlgorithmFamily::from_algorithm("TensorflowPredictEffnetDiscogs")
                .unwrap()
                .dir_name(),
            "discogs-effnet"
        );
        assert!(AlgorithmFamily::from_algorithm("TensorflowPredictVGGish").is_err());
    }

    #[test]
    fn test_backend_roles() {
        let extractor = ModelBackend::for_extractor(&embedding(AlgorithmKind::TensorflowPredictMusiCnn))
            .unwrap();
        assert_eq!(extractor.output(), "model/dense/BiasAdd");

        assert!(ModelBackend::for_extractor(&embedding(AlgorithmKind::TensorflowPredict2D)).is_err());
    }

    #[test]
    fn test_metadata_map_skips_absent() {
        let meta = ClassifierMetadata {
            author: Some("MTG".to_string()),
            dataset: Some("in-house".to_string()),
            ..Default::default()
        };
        let map = meta.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["author"], "MTG");
    }
}
