use anyhow::{Context, Result};
use burn::{backend::Autodiff, optim::AdamConfig};
use burn_retina::{PatchConfig, TrainingConfig, TransformConfig, training};
use tracing::info;

use super::{ensure_dir, network_config};
use crate::Cli;

#[cfg(not(feature = "wgpu"))]
mod backend {
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    pub type TrainBackend = NdArray;

    pub fn device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

#[cfg(feature = "wgpu")]
mod backend {
    use burn::backend::{Wgpu, wgpu::WgpuDevice};

    pub type TrainBackend = Wgpu<f32, i32>;

    pub fn device() -> WgpuDevice {
        WgpuDevice::default()
    }
}

type AutodiffBackend = Autodiff<backend::TrainBackend>;

pub fn run(cli: &Cli) -> Result<()> {
    ensure_dir(&cli.result_path)?;

    let network = network_config(cli)?;

    let mut patches = PatchConfig::new()
        .with_patch_size(cli.patch_size)
        .with_patches_per_image(cli.patches_per_image);
    if cli.augment {
        patches = patches.with_transform(TransformConfig::augmented());
    }

    let config = TrainingConfig::new(
        network,
        cli.dataset_path.clone(),
        cli.result_path.clone(),
        AdamConfig::new(),
    )
    .with_patches(patches)
    .with_num_epochs(cli.epoch)
    .with_learning_rate(cli.lr)
    .with_batch_size(cli.batch_size)
    .with_num_workers(cli.num_workers)
    .with_seed(cli.seed);

    let device = backend::device();
    let summary = training::train::<AutodiffBackend>(&config, &device)
        .with_context(|| format!("Training {} failed", cli.model))?;

    if let Some(last) = summary.last() {
        info!(
            "Finished after {} epochs, last loss {:.4}: {}",
            summary.epochs.len(),
            last.loss,
            last.validation
        );
    }

    Ok(())
}
