pub mod export;
pub mod infer;
pub mod train;

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::{
    backend::{NdArray, ndarray::NdArrayDevice},
    prelude::*,
};
use burn_retina::{
    NetworkConfig, TrainingConfig,
    training::{checkpoint_path, config_path},
};
use tracing::{debug, warn};

use crate::Cli;

/// CPU backend used for testing, export and inference.
pub type InferenceBackend = NdArray;

pub fn inference_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

/// Network requested on the command line. Without `--base_channels`, a
/// config left in the result path by a run of the same architecture provides
/// the hyperparameters so the checkpoint shapes line up.
pub fn network_config(cli: &Cli) -> Result<NetworkConfig> {
    let network = NetworkConfig::from_name(&cli.model)?;
    if let Some(base_channels) = cli.base_channels {
        return Ok(network.with_base_channels(base_channels));
    }

    let saved = config_path(&cli.result_path);
    if saved.is_file() {
        match TrainingConfig::load(&saved) {
            Ok(config) if config.network.kind == network.kind => {
                debug!("Using network from {}", saved.display());
                return Ok(config.network);
            }
            Ok(_) => {}
            Err(err) => warn!("Ignoring {}: {err}", saved.display()),
        }
    }

    Ok(network)
}

pub fn checkpoint(cli: &Cli, network: &NetworkConfig) -> Result<PathBuf> {
    let path = cli
        .checkpoint
        .clone()
        .unwrap_or_else(|| checkpoint_path(&cli.result_path, network.kind, None));

    if !path.is_file() {
        anyhow::bail!("Checkpoint {} does not exist", path.display());
    }

    Ok(path)
}

pub fn ensure_dir(path: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Unable to create {}", path.display()))
}
