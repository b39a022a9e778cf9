mod batcher;
mod folder;
mod patches;
mod retina;
mod transform;

use std::path::PathBuf;

use thiserror::Error;

pub use batcher::{PatchBatch, PatchBatcher};
pub use folder::{DriveSplit, IMAGES_DIR, MASKS_DIR, TARGETS_DIR};
pub use patches::{PatchConfig, PatchDataset, PatchSample, sample_aligned_patches};
pub use retina::{Plane, RetinaImage, RetinaTriple};
pub use transform::TransformConfig;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error on `{path:?}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to decode image `{path:?}`: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Directory does not exist: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("No images found in {0:?}")]
    Empty(PathBuf),

    #[error(
        "Split {root:?} has {images} images, {masks} masks and {targets} annotations"
    )]
    MismatchedSplit {
        root: PathBuf,
        images: usize,
        masks: usize,
        targets: usize,
    },

    #[error("Files do not belong to the same source image: {image:?}, {mask:?}, {target:?}")]
    UnpairedFiles {
        image: PathBuf,
        mask: PathBuf,
        target: PathBuf,
    },

    #[error("Split {root:?} has {len} images, no image at index {index}")]
    IndexOutOfRange {
        root: PathBuf,
        index: usize,
        len: usize,
    },

    #[error(
        "A {height}x{width} window does not fit in a {image_height}x{image_width} image"
    )]
    WindowTooLarge {
        height: usize,
        width: usize,
        image_height: usize,
        image_width: usize,
    },
}
