use std::path::{Path, PathBuf};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, RecorderError},
};

use crate::model::ModelKind;

pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

pub const CHECKPOINT_EXTENSION: &str = "mpk";

/// `{result}/{model}{epoch}.mpk`, or `{result}/{model}.mpk` for the final
/// checkpoint.
pub fn checkpoint_path(result_path: &Path, kind: ModelKind, epoch: Option<usize>) -> PathBuf {
    let stem = match epoch {
        Some(epoch) => format!("{}{epoch}", kind.name()),
        None => kind.name().to_string(),
    };

    result_path.join(format!("{stem}.{CHECKPOINT_EXTENSION}"))
}

pub fn save_checkpoint<B: Backend, M: Module<B>>(
    model: &M,
    path: &Path,
) -> Result<(), RecorderError> {
    model
        .clone()
        .save_file(path.to_path_buf(), &CheckpointRecorder::new())
}

pub fn load_checkpoint<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> Result<M, RecorderError> {
    model.load_file(path.to_path_buf(), &CheckpointRecorder::new(), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NetworkConfig, Segmenter};
    use burn::backend::NdArray;

    #[test]
    fn names_follow_the_model() {
        let root = Path::new("out");

        assert_eq!(
            checkpoint_path(root, ModelKind::R2UNet, Some(5)),
            root.join("R2U-Net5.mpk")
        );
        assert_eq!(
            checkpoint_path(root, ModelKind::IterNet, None),
            root.join("IterNet.mpk")
        );
    }

    #[test]
    fn round_trip_reproduces_predictions() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let config = NetworkConfig::new(ModelKind::UNet).with_base_channels(4);
        let model = config.init_unet::<NdArray>(&device);
        let path = checkpoint_path(dir.path(), ModelKind::UNet, Some(0));
        let images = Tensor::<NdArray, 4>::ones([1, 3, 16, 16], &device);

        save_checkpoint(&model, &path).unwrap();
        let restored =
            load_checkpoint(config.init_unet::<NdArray>(&device), &path, &device).unwrap();

        assert!(path.exists());
        restored
            .segment(images.clone())
            .into_data()
            .assert_approx_eq(&model.segment(images).into_data(), 6);
    }
}
