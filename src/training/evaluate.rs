use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::prelude::*;
use image::{RgbImage, imageops};
use thiserror::Error;
use tracing::info;

use super::{
    ConfusionMatrix, MetricRecord,
    checkpoint::{checkpoint_path, load_checkpoint},
    config::TESTING_SPLIT,
};
use crate::{
    dataset::{DatasetError, DriveSplit, RetinaImage},
    model::{NetworkConfig, Segmenter},
    with_network,
};

pub const PREDICTIONS_DIR: &str = "predictions";

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Unable to load checkpoint: {0}")]
    Recorder(#[from] burn::record::RecorderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to write `{path:?}`: {source}")]
    Render {
        path: PathBuf,
        source: image::ImageError,
    },
}

#[derive(Config, Debug)]
pub struct EvaluationConfig {
    pub network: NetworkConfig,
    pub dataset_path: PathBuf,
    pub result_path: PathBuf,
    /// Side of the centered square every test image is cropped to.
    #[config(default = 560)]
    pub crop_size: usize,
    /// Write an input / prediction / ground truth panel per image.
    #[config(default = false)]
    pub show: bool,
}

#[derive(Clone, Debug)]
pub struct ImageReport {
    pub name: String,
    pub metrics: MetricRecord,
}

#[derive(Clone, Debug)]
pub struct EvaluationReport {
    pub images: Vec<ImageReport>,
    pub mean: MetricRecord,
}

/// Loads the final checkpoint of `config.network` and scores it on the test
/// split.
pub fn evaluate<B: Backend>(
    config: &EvaluationConfig,
    device: &B::Device,
) -> Result<EvaluationReport, EvaluationError> {
    let path = checkpoint_path(&config.result_path, config.network.kind, None);
    info!("Loading {}", path.display());

    with_network!(config.network, device, |model| {
        let model = load_checkpoint::<B, _>(model, &path, device)?;
        evaluate_model(config, &model, device)
    })
}

pub fn evaluate_model<B: Backend, M: Segmenter<B>>(
    config: &EvaluationConfig,
    model: &M,
    device: &B::Device,
) -> Result<EvaluationReport, EvaluationError> {
    let split = DriveSplit::open(config.dataset_path.join(TESTING_SPLIT))?;
    if config.show {
        fs::create_dir_all(config.result_path.join(PREDICTIONS_DIR))?;
    }

    let mut images = Vec::with_capacity(split.len());

    for index in 0..split.len() {
        let triple = split
            .load(index)?
            .map(|plane| plane.center_crop(config.crop_size))?;

        let probabilities = model
            .segment(triple.image.to_tensor::<B>(device).unsqueeze::<4>())
            .squeeze::<3>(0);

        let matrix = ConfusionMatrix::from_predictions(
            probabilities.clone(),
            triple.target.to_tensor::<B>(device),
            triple.mask.to_tensor::<B>(device),
        );
        let metrics = MetricRecord::from_confusion(&matrix);
        info!("{}: {metrics}", triple.name);

        if config.show {
            let prediction = RetinaImage::from_tensor(probabilities);
            let path = predictions_path(&config.result_path, &triple.name);
            render_panels(&triple.image, &prediction, &triple.target)
                .save(&path)
                .map_err(|source| EvaluationError::Render { path, source })?;
        }

        images.push(ImageReport {
            name: triple.name,
            metrics,
        });
    }

    let records: Vec<_> = images.iter().map(|report| report.metrics).collect();
    let mean = MetricRecord::mean(&records);

    info!(
        "F1: {:.4}, Sensitivity: {:.4}, Specificity: {:.4}, Accuracy: {:.4}, AUC: {:.4}",
        mean.f1, mean.sensitivity, mean.specificity, mean.accuracy, mean.auc
    );

    Ok(EvaluationReport { images, mean })
}

/// Input, prediction and ground truth side by side.
pub fn render_panels(
    image: &RetinaImage,
    prediction: &RetinaImage,
    target: &RetinaImage,
) -> RgbImage {
    let (height, width) = (image.height() as u32, image.width() as u32);
    let panels = [image.to_rgb8(), prediction.to_rgb8(), target.to_rgb8()];

    let mut canvas = RgbImage::new(width * panels.len() as u32, height);
    for (index, panel) in panels.iter().enumerate() {
        imageops::replace(&mut canvas, panel, index as i64 * i64::from(width), 0);
    }

    canvas
}

/// `{result}/predictions/{name}.png`
pub fn predictions_path(result_path: &Path, name: &str) -> PathBuf {
    result_path.join(PREDICTIONS_DIR).join(format!("{name}.png"))
}
