pub mod model;

#[cfg(feature = "dataset")]
pub mod dataset;

#[cfg(feature = "training")]
pub mod training;

#[cfg(feature = "export")]
pub mod export;

pub use model::{ModelKind, NetworkConfig, Segmenter};

#[cfg(feature = "dataset")]
pub use dataset::{PatchConfig, PatchDataset, TransformConfig};

#[cfg(feature = "training")]
pub use training::{EvaluationConfig, MetricRecord, TrainingConfig};

#[cfg(feature = "export")]
pub use export::{InferenceArtifact, InferenceGraph, Predictor};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
