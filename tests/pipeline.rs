mod common;

use std::path::Path;

use burn::{
    backend::{Autodiff, NdArray},
    optim::AdamConfig,
};
use burn_retina::{
    ModelKind, NetworkConfig, PatchConfig, TrainingConfig, TransformConfig,
    training::{self, EvaluationConfig, TrainingError},
};

type TestBackend = NdArray;
type TestAutodiffBackend = Autodiff<TestBackend>;

fn training_config(kind: ModelKind, dataset: &Path, result: &Path) -> TrainingConfig {
    TrainingConfig::new(
        NetworkConfig::new(kind).with_base_channels(4),
        dataset.to_path_buf(),
        result.to_path_buf(),
        AdamConfig::new(),
    )
    .with_patches(
        PatchConfig::new()
            .with_patch_size(16)
            .with_patches_per_image(4)
            .with_transform(TransformConfig::augmented()),
    )
    .with_num_epochs(1)
    .with_batch_size(2)
}

#[test]
fn one_epoch_writes_checkpoints_and_finite_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::drive_dataset(&dir.path().join("DRIVE"), 40, 2);
    let result = dir.path().join("result");
    let config = training_config(ModelKind::UNet, &dataset, &result);

    let summary = training::train::<TestAutodiffBackend>(&config, &Default::default()).unwrap();

    assert_eq!(summary.epochs.len(), 1);
    assert!(result.join("U-Net0.mpk").is_file());
    assert!(result.join("U-Net.mpk").is_file());
    assert!(result.join("config.json").is_file());

    let last = summary.last().unwrap();
    assert!(last.loss.is_finite());
    assert!(last.validation.is_finite());
    assert!((last.learning_rate - config.learning_rate).abs() < 1e-12);
}

#[test]
fn learning_rate_above_one_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::drive_dataset(&dir.path().join("DRIVE"), 32, 1);
    let config = training_config(ModelKind::UNet, &dataset, &dir.path().join("result"))
        .with_learning_rate(2.0);

    let err = training::train::<TestAutodiffBackend>(&config, &Default::default()).unwrap_err();

    assert!(matches!(err, TrainingError::Schedule(_)));
}

#[test]
fn trained_model_is_scored_on_the_test_split() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::drive_dataset(&dir.path().join("DRIVE"), 40, 2);
    let result = dir.path().join("result");
    let config = training_config(ModelKind::UNet, &dataset, &result);
    training::train::<TestAutodiffBackend>(&config, &Default::default()).unwrap();

    let evaluation = EvaluationConfig::new(config.network.clone(), dataset, result.clone())
        .with_crop_size(32)
        .with_show(true);
    let report = training::evaluate::<TestBackend>(&evaluation, &Default::default()).unwrap();

    assert_eq!(report.images.len(), 2);
    assert!(report.mean.is_finite());
    for image in &report.images {
        let panel = image::open(training::predictions_path(&result, &image.name)).unwrap();
        assert_eq!((panel.width(), panel.height()), (96, 32));
    }
}

#[test]
fn iternet_trains_on_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::drive_dataset(&dir.path().join("DRIVE"), 32, 1);
    let result = dir.path().join("result");
    let config = training_config(ModelKind::IterNet, &dataset, &result);

    let summary = training::train::<TestAutodiffBackend>(&config, &Default::default()).unwrap();

    assert!(result.join("IterNet0.mpk").is_file());
    assert!(result.join("IterNet.mpk").is_file());
    assert!(summary.last().unwrap().loss.is_finite());
}

#[test]
fn checkpoints_follow_the_interval() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::drive_dataset(&dir.path().join("DRIVE"), 32, 1);
    let result = dir.path().join("result");
    let config = training_config(ModelKind::UNet, &dataset, &result)
        .with_num_epochs(3)
        .with_checkpoint_interval(2)
        .with_patches(PatchConfig::new().with_patch_size(16).with_patches_per_image(1));

    let summary = training::train::<TestAutodiffBackend>(&config, &Default::default()).unwrap();

    assert_eq!(summary.epochs.len(), 3);
    assert!(result.join("U-Net0.mpk").is_file());
    assert!(!result.join("U-Net1.mpk").exists());
    assert!(result.join("U-Net2.mpk").is_file());
    assert!(result.join("U-Net.mpk").is_file());

    let rates: Vec<f64> = summary.epochs.iter().map(|epoch| epoch.learning_rate).collect();
    assert!((rates[0] - config.learning_rate).abs() < 1e-12);
    assert!(rates.windows(2).all(|pair| pair[1] < pair[0]));
    assert!(rates[2] > config.min_learning_rate);
}
