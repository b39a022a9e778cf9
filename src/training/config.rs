use std::path::{Path, PathBuf};

use burn::{optim::AdamConfig, prelude::*};

use crate::{dataset::PatchConfig, model::NetworkConfig};

pub const TRAINING_SPLIT: &str = "training";
pub const VALIDATION_SPLIT: &str = "validation";
pub const TESTING_SPLIT: &str = "testing";

#[derive(Config)]
pub struct TrainingConfig {
    pub network: NetworkConfig,
    pub dataset_path: PathBuf,
    pub result_path: PathBuf,
    /// No augmentation unless a transform is set.
    #[config(default = "PatchConfig::new()")]
    pub patches: PatchConfig,
    pub optimizer: AdamConfig,
    #[config(default = 45)]
    pub num_epochs: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Floor of the cosine schedule.
    #[config(default = 1e-5)]
    pub min_learning_rate: f64,
    #[config(default = 1)]
    pub batch_size: usize,
    #[config(default = 0)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// A checkpoint is written whenever `epoch % checkpoint_interval == 0`.
    #[config(default = 5)]
    pub checkpoint_interval: usize,
}

impl TrainingConfig {
    pub fn split_path(&self, split: &str) -> PathBuf {
        self.dataset_path.join(split)
    }

    pub fn config_path(&self) -> PathBuf {
        config_path(&self.result_path)
    }

    /// Patches drawn from each source image at `epoch`. Validation patches are
    /// not augmented.
    pub fn validation_patches(&self) -> PatchConfig {
        PatchConfig::new()
            .with_patch_size(self.patches.patch_size)
            .with_patches_per_image(self.patches.patches_per_image)
    }

    /// Seed used to rebuild the patch datasets at the start of `epoch`. Source
    /// images are offset from it by their index, so epochs are kept far apart.
    pub fn epoch_seed(&self, epoch: usize) -> u64 {
        self.seed ^ ((epoch as u64) << 32)
    }
}

pub fn config_path(result_path: &Path) -> PathBuf {
    result_path.join("config.json")
}
