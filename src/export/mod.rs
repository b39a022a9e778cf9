mod predictor;

use std::path::{Path, PathBuf};

use burn::{
    prelude::*,
    record::{BinFileRecorder, FullPrecisionSettings, RecorderError},
};
use thiserror::Error;
use tracing::info;

use crate::{
    model::{NetworkConfig, Segmenter},
    training::load_checkpoint,
    with_network,
};

pub use predictor::{
    ParityReport, Predictor, check_parity, infer_synthetic, run_parity_check, synthetic_input,
};

pub type ParamsRecorder = BinFileRecorder<FullPrecisionSettings>;

pub const GRAPH_FILE: &str = "inference.json";
pub const PARAMS_FILE: &str = "inference.bin";
pub const INPUT_NAME: &str = "input";
pub const OUTPUT_NAME: &str = "output";
/// Side of the square images the exported graph accepts.
pub const INPUT_SIZE: usize = 560;
/// Largest absolute difference tolerated between the live model and its export.
pub const PARITY_TOLERANCE: f32 = 1e-4;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to read inference graph: {0}")]
    Graph(#[from] burn::config::ConfigError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Unknown input `{0}`")]
    UnknownInput(String),

    #[error("Input `{name}` expects shape {expected:?} of {dtype}, got {actual:?}")]
    InputShape {
        name: String,
        expected: Vec<Option<usize>>,
        dtype: String,
        actual: Vec<usize>,
    },

    #[error("Input `{0}` has not been set")]
    MissingInput(String),

    #[error("Output `{0}` is not available, call run() first")]
    MissingOutput(String),
}

/// Fixed-shape input declaration. `None` dimensions accept any size.
#[derive(Config, Debug, PartialEq)]
pub struct InputSpec {
    pub name: String,
    pub shape: Vec<Option<usize>>,
    pub dtype: String,
}

impl InputSpec {
    /// `[None, 3, size, size]` float32 images named `input`.
    pub fn image(channels: usize, size: usize) -> Self {
        Self::new(
            INPUT_NAME.to_string(),
            vec![None, Some(channels), Some(size), Some(size)],
            "float32".to_string(),
        )
    }

    pub fn accepts(&self, dims: &[usize]) -> bool {
        dims.len() == self.shape.len()
            && self
                .shape
                .iter()
                .zip(dims)
                .all(|(expected, actual)| expected.is_none_or(|size| size == *actual))
    }
}

/// Descriptor written next to the parameters: enough to rebuild the network
/// without the training code.
#[derive(Config, Debug)]
pub struct InferenceGraph {
    pub network: NetworkConfig,
    pub input: InputSpec,
    pub outputs: Vec<String>,
}

/// Locations of an exported graph and its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceArtifact {
    pub graph_file: PathBuf,
    pub params_file: PathBuf,
}

impl InferenceArtifact {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            graph_file: dir.join(GRAPH_FILE),
            params_file: dir.join(PARAMS_FILE),
        }
    }

    pub fn exists(&self) -> bool {
        self.graph_file.is_file() && self.params_file.is_file()
    }
}

/// Freezes `model` and writes it as an inference artifact under `dir`.
pub fn export_model<B: Backend, M: Segmenter<B>>(
    model: M,
    network: &NetworkConfig,
    dir: &Path,
) -> Result<InferenceArtifact, ExportError> {
    std::fs::create_dir_all(dir)?;
    let artifact = InferenceArtifact::in_dir(dir);

    let graph = InferenceGraph::new(
        network.clone(),
        InputSpec::image(network.input_channels, INPUT_SIZE),
        vec![OUTPUT_NAME.to_string()],
    );
    graph.save(&artifact.graph_file)?;

    model
        .no_grad()
        .save_file(artifact.params_file.clone(), &ParamsRecorder::new())?;

    info!(
        "Exported {} to {} and {}",
        network.kind.name(),
        artifact.graph_file.display(),
        artifact.params_file.display()
    );

    Ok(artifact)
}

/// Loads a training checkpoint onto the inference backend `B` and exports it.
pub fn export_checkpoint<B: Backend>(
    network: &NetworkConfig,
    checkpoint: &Path,
    dir: &Path,
    device: &B::Device,
) -> Result<InferenceArtifact, ExportError> {
    with_network!(network, device, |model| {
        let model = load_checkpoint::<B, _>(model, checkpoint, device)?;
        export_model(model, network, dir)
    })
}
