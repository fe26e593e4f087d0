//! Model registry
//!
//! Discovers classification heads from a directory tree and resolves the
//! feature extractor each one references. Layout:
//!
//! ```text
//! <models>/classification-heads/<id>/<id>.json + <id>.pb
//! <models>/feature-extractors/<family>/<model>.json + <model>.pb
//! <models>/feature-extractors/<family>/<model>/<model>.json   (alternate)
//! ```

mod descriptor;
mod discovery;

pub use descriptor::ModelDescriptor;
pub use discovery::{embedding_input_shape, Discovery, ModelRegistry, DEFAULT_SAMPLE_RATE};
