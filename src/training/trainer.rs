use std::fs;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder, Dataset},
    lr_scheduler::{LrScheduler, cosine::CosineAnnealingLrSchedulerConfig},
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info};

use super::{
    ConfusionMatrix, MaskedBceLossConfig, MetricRecord, TrainingConfig,
    checkpoint::{checkpoint_path, save_checkpoint},
    config::{TRAINING_SPLIT, VALIDATION_SPLIT},
    output::forward_segmentation,
};
use crate::{
    dataset::{DatasetError, PatchBatch, PatchBatcher, PatchDataset},
    model::Segmenter,
    with_network,
};

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Unable to write checkpoint: {0}")]
    Recorder(#[from] burn::record::RecorderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Split {0} produced no patches")]
    NoPatches(String),

    #[error("Invalid learning rate schedule: {0}")]
    Schedule(String),
}

#[derive(Clone, Debug)]
pub struct EpochReport {
    pub epoch: usize,
    pub learning_rate: f64,
    /// Summed batch loss divided by the number of batches.
    pub loss: f64,
    pub validation: MetricRecord,
}

#[derive(Clone, Debug, Default)]
pub struct TrainingSummary {
    pub epochs: Vec<EpochReport>,
}

impl TrainingSummary {
    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }
}

/// Trains the network described by `config.network` and writes its
/// checkpoints to `config.result_path`.
pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainingSummary, TrainingError> {
    fs::create_dir_all(&config.result_path)?;
    config.save(config.config_path())?;

    B::seed(config.seed);

    with_network!(config.network, device, |model| fit::<B, _>(
        config, model, device
    ))
}

/// Runs the epoch loop on an already initialized model.
pub fn fit<B, M>(
    config: &TrainingConfig,
    mut model: M,
    device: &B::Device,
) -> Result<TrainingSummary, TrainingError>
where
    B: AutodiffBackend,
    M: Segmenter<B> + AutodiffModule<B>,
    M::InnerModule: Segmenter<B::InnerBackend>,
{
    let kind = config.network.kind;
    let loss = MaskedBceLossConfig::new().init::<B>();
    let mut optimizer = config.optimizer.init::<B, M>();
    let mut scheduler =
        CosineAnnealingLrSchedulerConfig::new(config.learning_rate, config.num_epochs.max(1))
            .with_min_lr(config.min_learning_rate)
            .init()
            .map_err(TrainingError::Schedule)?;

    info!(
        "Training {} for {} epochs on {}",
        kind.name(),
        config.num_epochs,
        config.dataset_path.display()
    );

    let mut summary = TrainingSummary::default();

    for epoch in 0..config.num_epochs {
        let learning_rate = scheduler.step();
        let seed = config.epoch_seed(epoch);

        let dataset_train =
            PatchDataset::from_folder(config.split_path(TRAINING_SPLIT), &config.patches, seed)?;
        let dataset_valid = PatchDataset::from_folder(
            config.split_path(VALIDATION_SPLIT),
            &config.validation_patches(),
            seed,
        )?;

        if dataset_train.is_empty() {
            return Err(TrainingError::NoPatches(TRAINING_SPLIT.to_string()));
        }

        let num_batches = dataset_train.len().div_ceil(config.batch_size.max(1));

        let mut builder_train = DataLoaderBuilder::new(PatchBatcher::<B>::new(device.clone()))
            .batch_size(config.batch_size)
            .shuffle(seed);
        let mut builder_valid =
            DataLoaderBuilder::new(PatchBatcher::<B::InnerBackend>::new(device.clone()))
                .batch_size(config.batch_size);
        if config.num_workers > 0 {
            builder_train = builder_train.num_workers(config.num_workers);
            builder_valid = builder_valid.num_workers(config.num_workers);
        }
        let dataloader_train = builder_train.build(dataset_train);
        let dataloader_valid = builder_valid.build(dataset_valid);

        let progress = ProgressBar::new(num_batches as u64);
        progress.set_style(
            ProgressStyle::with_template(
                "epoch {prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_prefix(epoch.to_string());

        let mut loss_sum = 0.0;
        let mut batches = 0usize;

        for batch in dataloader_train.iter() {
            let output = forward_segmentation(&model, &loss, batch);
            let batch_loss = output.loss.clone().into_scalar().elem::<f64>();

            let grads = GradientsParams::from_grads(output.loss.backward(), &model);
            model = optimizer.step(learning_rate, model, grads);

            loss_sum += batch_loss;
            batches += 1;
            progress.set_message(format!("loss {batch_loss:.4}"));
            progress.inc(1);
        }
        progress.finish_and_clear();

        let epoch_loss = loss_sum / batches.max(1) as f64;

        if epoch % config.checkpoint_interval.max(1) == 0 {
            let path = checkpoint_path(&config.result_path, kind, Some(epoch));
            save_checkpoint(&model, &path)?;
            debug!("Saved checkpoint {}", path.display());
        }

        let validation = validate(&model.valid(), dataloader_valid.as_ref());

        info!(
            epoch,
            loss = epoch_loss,
            lr = learning_rate,
            "[Validation] {validation}"
        );

        summary.epochs.push(EpochReport {
            epoch,
            learning_rate,
            loss: epoch_loss,
            validation,
        });
    }

    let path = checkpoint_path(&config.result_path, kind, None);
    save_checkpoint(&model, &path)?;
    info!("Saved final model to {}", path.display());

    Ok(summary)
}

/// Mean per-sample metrics over every validation batch.
pub fn validate<B: Backend, M: Segmenter<B>>(
    model: &M,
    dataloader: &dyn DataLoader<PatchBatch<B>>,
) -> MetricRecord {
    let mut records = Vec::new();

    for batch in dataloader.iter() {
        let predictions = model.segment(batch.images);

        records.extend(
            ConfusionMatrix::per_sample(predictions, batch.targets, batch.masks)
                .iter()
                .map(MetricRecord::from_confusion),
        );
    }

    MetricRecord::mean(&records)
}
