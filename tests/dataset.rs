mod common;

use burn::data::dataset::Dataset;
use burn_retina::{
    PatchConfig, PatchDataset,
    dataset::{DatasetError, DriveSplit, TARGETS_DIR},
};

#[test]
fn builds_patches_from_every_source_image() {
    let dir = tempfile::tempdir().unwrap();
    common::write_split(dir.path(), "training", 40, 3);
    let config = PatchConfig::new()
        .with_patch_size(16)
        .with_patches_per_image(5);

    let dataset = PatchDataset::from_folder(dir.path(), &config, 1).unwrap();

    assert_eq!(dataset.len(), 15);
    let sample = dataset.get(0).unwrap();
    assert_eq!(
        (sample.image.channels(), sample.image.height(), sample.image.width()),
        (3, 16, 16)
    );
    assert_eq!((sample.mask.channels(), sample.target.channels()), (1, 1));
    assert!(
        sample
            .target
            .to_vec()
            .iter()
            .all(|&value| value == 0.0 || value == 1.0)
    );
}

#[test]
fn rejects_splits_with_missing_annotations() {
    let dir = tempfile::tempdir().unwrap();
    common::write_split(dir.path(), "training", 24, 2);
    std::fs::remove_file(dir.path().join(TARGETS_DIR).join("22_manual1.png")).unwrap();

    let err = DriveSplit::open(dir.path()).unwrap_err();

    assert!(matches!(
        err,
        DatasetError::MismatchedSplit {
            images: 2,
            masks: 2,
            targets: 1,
            ..
        }
    ));
}

#[test]
fn rejects_files_from_different_source_images() {
    let dir = tempfile::tempdir().unwrap();
    common::write_split(dir.path(), "training", 24, 2);
    let targets = dir.path().join(TARGETS_DIR);
    std::fs::rename(targets.join("22_manual1.png"), targets.join("23_manual1.png")).unwrap();

    let err = DriveSplit::open(dir.path()).unwrap_err();

    assert!(matches!(err, DatasetError::UnpairedFiles { .. }));
}

#[test]
fn rejects_patches_larger_than_the_images() {
    let dir = tempfile::tempdir().unwrap();
    common::write_split(dir.path(), "training", 24, 1);
    let config = PatchConfig::new().with_patch_size(32);

    let err = PatchDataset::from_folder(dir.path(), &config, 0).err().unwrap();

    assert!(matches!(err, DatasetError::WindowTooLarge { .. }));
}
