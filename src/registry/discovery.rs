//! Classifier discovery and embedding-model resolution

use super::descriptor::{value_to_string, ModelDescriptor};
use crate::config::{CLASSIFICATION_HEADS_DIR, FEATURE_EXTRACTORS_DIR};
use crate::error::RegistryError;
use crate::model::{
    AlgorithmFamily, AlgorithmKind, ClassifierMetadata, ClassifierSpec, EmbeddingModelSpec,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Sample rate assumed when a descriptor does not declare one
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Algorithm assumed for a classification head that does not declare one
pub const DEFAULT_CLASSIFIER_ALGORITHM: AlgorithmKind = AlgorithmKind::TensorflowPredict2D;

/// Graph file extension used when none is configured
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "pb";

/// Outcome of a discovery pass
#[derive(Debug, Default)]
pub struct Discovery {
    /// Classifiers that resolved, in discovery order
    pub classifiers: Vec<ClassifierSpec>,
    /// Descriptors that were skipped, with the reason
    pub skipped: Vec<(PathBuf, RegistryError)>,
}

/// Locates classification heads and the feature extractors they reference
pub struct ModelRegistry {
    heads_dir: PathBuf,
    extractors_dir: PathBuf,
    artifact_extension: String,
}

impl ModelRegistry {
    /// Registry rooted at a models directory with the standard layout
    pub fn new(models_dir: &Path) -> Self {
        Self::with_dirs(
            models_dir.join(CLASSIFICATION_HEADS_DIR),
            models_dir.join(FEATURE_EXTRACTORS_DIR),
        )
    }

    pub fn with_dirs(heads_dir: PathBuf, extractors_dir: PathBuf) -> Self {
        Self {
            heads_dir,
            extractors_dir,
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
        }
    }

    /// Graph file extension to look for (e.g. "pb", "onnx")
    pub fn with_artifact_extension(mut self, extension: &str) -> Self {
        self.artifact_extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Resolve every classifier under the heads directory.
    ///
    /// Never fails as a whole: bad descriptors are logged and left out.
    pub fn discover(&self) -> Vec<ClassifierSpec> {
        self.discover_with_report().classifiers
    }

    /// Like [`discover`](Self::discover), also returning what was skipped and why
    pub fn discover_with_report(&self) -> Discovery {
        let mut discovery = Discovery::default();

        if !self.heads_dir.is_dir() {
            log::error!(
                "Classification heads directory not found: {:?}",
                self.heads_dir
            );
            return discovery;
        }

        let mut embeddings: HashMap<(AlgorithmFamily, String), Arc<EmbeddingModelSpec>> =
            HashMap::new();

        for classifier_dir in sorted_entries(&self.heads_dir) {
            if !classifier_dir.is_dir() {
                continue;
            }

            let json_files: Vec<PathBuf> = sorted_entries(&classifier_dir)
                .into_iter()
                .filter(|p| p.is_file() && has_extension(p, "json"))
                .collect();

            if json_files.is_empty() {
                log::debug!("No JSON descriptor in {:?}, skipping", classifier_dir);
                continue;
            }

            for json_path in json_files {
                match self.load_classifier(&json_path, &mut embeddings) {
                    Ok(spec) => {
                        log::info!("Loaded classifier: {} (v{})", spec.name, spec.version);
                        discovery.classifiers.push(spec);
                    }
                    Err(e) => {
                        log::warn!("Skipping classifier {:?}: {}", json_path, e);
                        discovery.skipped.push((json_path, e));
                    }
                }
            }
        }

        log::info!("Discovered {} classifier(s)", discovery.classifiers.len());
        discovery
    }

    /// Resolve one classification-head descriptor
    pub fn load_classifier(
        &self,
        json_path: &Path,
        embeddings: &mut HashMap<(AlgorithmFamily, String), Arc<EmbeddingModelSpec>>,
    ) -> Result<ClassifierSpec, RegistryError> {
        let descriptor = ModelDescriptor::load(json_path)?;

        let name = descriptor
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| file_stem(json_path));
        let version = descriptor
            .version_string()
            .unwrap_or_else(|| "unknown".to_string());

        let algorithm = match descriptor.inference.algorithm.as_deref() {
            Some(a) => a.parse::<AlgorithmKind>()?,
            None => DEFAULT_CLASSIFIER_ALGORITHM,
        };
        if algorithm.is_extractor() {
            return Err(RegistryError::WrongRole {
                algorithm: algorithm.to_string(),
                role: "a classification head",
            });
        }

        let class_labels = validate_labels(&descriptor.classes, json_path)?;

        let input_node_id = descriptor
            .input_node()
            .ok_or_else(|| RegistryError::NoInputNode(json_path.to_path_buf()))?
            .to_string();
        let output_node_id = descriptor
            .output_node("predictions")
            .ok_or_else(|| RegistryError::NoPredictionsOutput(json_path.to_path_buf()))?
            .to_string();

        let reference = descriptor.inference.embedding_model.clone().unwrap_or_default();
        let embedding_algorithm = reference
            .algorithm
            .filter(|a| !a.is_empty())
            .ok_or(RegistryError::MissingField {
                field: "inference.embedding_model.algorithm",
                path: json_path.to_path_buf(),
            })?;
        let embedding_name = reference
            .model_name
            .filter(|n| !n.is_empty())
            .ok_or(RegistryError::MissingField {
                field: "inference.embedding_model.model_name",
                path: json_path.to_path_buf(),
            })?;

        let family = AlgorithmFamily::from_algorithm(&embedding_algorithm)?;
        let key = (family, embedding_name.clone());
        let embedding_model = match embeddings.get(&key) {
            Some(spec) => Arc::clone(spec),
            None => {
                let spec = Arc::new(self.load_embedding_model(
                    &embedding_name,
                    &embedding_algorithm,
                    family,
                )?);
                embeddings.insert(key, Arc::clone(&spec));
                spec
            }
        };

        let artifact_path = json_path.with_extension(&self.artifact_extension);
        if !artifact_path.exists() {
            return Err(RegistryError::ArtifactNotFound(format!(
                "classifier {} ({:?})",
                name, artifact_path
            )));
        }

        Ok(ClassifierSpec {
            name,
            version,
            description: descriptor.description.clone().unwrap_or_default(),
            algorithm,
            artifact_path,
            sample_rate_hz: descriptor.inference.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            class_labels,
            input_node_id,
            output_node_id,
            embedding_model,
            metadata: metadata_of(&descriptor),
        })
    }

    /// Resolve a feature extractor by family and model name
    pub fn load_embedding_model(
        &self,
        model_name: &str,
        referenced_algorithm: &str,
        family: AlgorithmFamily,
    ) -> Result<EmbeddingModelSpec, RegistryError> {
        let family_dir = self.extractors_dir.join(family.dir_name());
        let json_path = locate_embedding_descriptor(&family_dir, model_name)?;
        let descriptor = ModelDescriptor::load(&json_path)?;

        let algorithm: AlgorithmKind = descriptor
            .inference
            .algorithm
            .as_deref()
            .unwrap_or(referenced_algorithm)
            .parse()?;
        if !algorithm.is_extractor() {
            return Err(RegistryError::WrongRole {
                algorithm: algorithm.to_string(),
                role: "an embedding model",
            });
        }

        let output_node_id = descriptor
            .output_node("embeddings")
            .ok_or_else(|| RegistryError::NoEmbeddingsOutput(json_path.clone()))?
            .to_string();

        let artifact_path = [
            json_path.with_extension(&self.artifact_extension),
            family_dir
                .join(model_name)
                .join(format!("{}.{}", model_name, self.artifact_extension)),
            family_dir.join(format!("{}.{}", model_name, self.artifact_extension)),
        ]
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| RegistryError::ArtifactNotFound(format!("embedding model {}", model_name)))?;

        Ok(EmbeddingModelSpec {
            name: model_name.to_string(),
            family,
            algorithm,
            artifact_path,
            sample_rate_hz: descriptor.inference.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            output_node_id,
            input_node_id: descriptor.input_node().map(str::to_string),
            input_shape: descriptor.input_shape(),
        })
    }
}

/// Canonical `<family>/<model>.json`, then nested `<family>/<model>/<model>.json`
fn locate_embedding_descriptor(family_dir: &Path, model_name: &str) -> Result<PathBuf, RegistryError> {
    let canonical = family_dir.join(format!("{}.json", model_name));
    if canonical.exists() {
        return Ok(canonical);
    }
    let nested = family_dir.join(model_name).join(format!("{}.json", model_name));
    if nested.exists() {
        return Ok(nested);
    }
    Err(RegistryError::DescriptorNotFound(canonical))
}

/// Input shape of the embedding model that produced `artifact_path`.
///
/// Looks for `<stem>.json` beside the artifact, then one level up (the
/// canonical descriptor of a nested layout). None when neither exists or the
/// descriptor publishes no shape.
pub fn embedding_input_shape(artifact_path: &Path) -> Option<Vec<i64>> {
    let stem = artifact_path.file_stem()?.to_string_lossy().into_owned();
    let descriptor_name = format!("{}.json", stem);
    let parent = artifact_path.parent()?;

    let candidates = [
        Some(parent.join(&descriptor_name)),
        parent.parent().map(|grandparent| grandparent.join(&descriptor_name)),
    ];

    let json_path = candidates.into_iter().flatten().find(|p| p.exists())?;
    match ModelDescriptor::load(&json_path) {
        Ok(descriptor) => descriptor.input_shape(),
        Err(e) => {
            log::warn!("Failed to read embedding model descriptor: {}", e);
            None
        }
    }
}

fn validate_labels(classes: &[String], path: &Path) -> Result<Vec<String>, RegistryError> {
    if classes.is_empty() {
        return Err(RegistryError::MissingField {
            field: "classes",
            path: path.to_path_buf(),
        });
    }
    let mut seen = HashSet::new();
    for label in classes {
        if !seen.insert(label.as_str()) {
            return Err(RegistryError::DuplicateLabel {
                label: label.clone(),
                path: path.to_path_buf(),
            });
        }
    }
    Ok(classes.to_vec())
}

fn metadata_of(descriptor: &ModelDescriptor) -> ClassifierMetadata {
    let text = |v: &Option<serde_json::Value>| v.as_ref().map(value_to_string);
    ClassifierMetadata {
        author: text(&descriptor.author),
        email: text(&descriptor.email),
        release_date: text(&descriptor.release_date),
        framework: text(&descriptor.framework),
        framework_version: text(&descriptor.framework_version),
        dataset: text(&descriptor.dataset),
    }
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(e) => {
                log::warn!("Failed to list {:?}: {}", dir, e);
                None
            }
        })
        .collect()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
