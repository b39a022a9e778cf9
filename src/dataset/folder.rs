use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DatasetError, RetinaImage, RetinaTriple};

pub const IMAGES_DIR: &str = "images";
pub const MASKS_DIR: &str = "mask";
pub const TARGETS_DIR: &str = "1st_manual";

const SUPPORTED_FILES: [&str; 8] = ["bmp", "gif", "jpg", "jpeg", "png", "ppm", "tif", "tiff"];

/// The files of one DRIVE split (`training`, `validation` or `testing`).
///
/// The three subfolders are listed in lexicographic order and paired by
/// position. Opening a split checks that the listings have the same length
/// and that paired files share their id, the part of the file stem before
/// the first `_` (`21_training.tif`, `21_training_mask.gif`, `21_manual1.gif`).
#[derive(Clone, Debug)]
pub struct DriveSplit {
    root: PathBuf,
    images: Vec<PathBuf>,
    masks: Vec<PathBuf>,
    targets: Vec<PathBuf>,
}

impl DriveSplit {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, DatasetError> {
        let root = root.as_ref().to_path_buf();
        let images = list_images(&root.join(IMAGES_DIR))?;
        let masks = list_images(&root.join(MASKS_DIR))?;
        let targets = list_images(&root.join(TARGETS_DIR))?;

        if images.is_empty() {
            return Err(DatasetError::Empty(root.join(IMAGES_DIR)));
        }

        if images.len() != masks.len() || images.len() != targets.len() {
            return Err(DatasetError::MismatchedSplit {
                root,
                images: images.len(),
                masks: masks.len(),
                targets: targets.len(),
            });
        }

        for ((image, mask), target) in images.iter().zip(&masks).zip(&targets) {
            let id = file_id(image);
            if file_id(mask) != id || file_id(target) != id {
                return Err(DatasetError::UnpairedFiles {
                    image: image.clone(),
                    mask: mask.clone(),
                    target: target.clone(),
                });
            }
        }

        debug!("Opened split {} with {} images", root.display(), images.len());

        Ok(Self {
            root,
            images,
            masks,
            targets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Decodes the `index`-th image together with its mask and annotation.
    pub fn load(&self, index: usize) -> Result<RetinaTriple, DatasetError> {
        let (Some(image_path), Some(mask_path), Some(target_path)) = (
            self.images.get(index),
            self.masks.get(index),
            self.targets.get(index),
        ) else {
            return Err(DatasetError::IndexOutOfRange {
                root: self.root.clone(),
                index,
                len: self.len(),
            });
        };

        let name = image_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| index.to_string());

        Ok(RetinaTriple {
            name,
            image: RetinaImage::load_rgb(image_path)?,
            mask: RetinaImage::load_binary(mask_path)?,
            target: RetinaImage::load_binary(target_path)?,
        })
    }

    pub fn load_all(&self) -> Result<Vec<RetinaTriple>, DatasetError> {
        (0..self.len()).map(|index| self.load(index)).collect()
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    if !dir.exists() || !dir.is_dir() {
        return Err(DatasetError::MissingDirectory(dir.to_path_buf()));
    }

    let io_error = |source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();

        if path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    SUPPORTED_FILES
                        .iter()
                        .any(|&valid_ext| valid_ext.eq_ignore_ascii_case(ext))
                })
        {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

fn file_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    match stem.split_once('_') {
        Some((id, _)) => id.to_string(),
        None => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_is_the_stem_prefix() {
        assert_eq!(file_id(Path::new("a/21_training.tif")), "21");
        assert_eq!(file_id(Path::new("a/21_training_mask.gif")), "21");
        assert_eq!(file_id(Path::new("a/01_test.png")), "01");
        assert_eq!(file_id(Path::new("a/plain.png")), "plain");
    }

    #[test]
    fn missing_subfolder_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(IMAGES_DIR)).unwrap();

        let err = DriveSplit::open(dir.path()).unwrap_err();

        assert!(matches!(err, DatasetError::MissingDirectory(path) if path.ends_with(MASKS_DIR)));
    }

    #[test]
    fn load_past_the_end_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        for sub in [IMAGES_DIR, MASKS_DIR, TARGETS_DIR] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
        }
        for (sub, file) in [
            (IMAGES_DIR, "21_training.png"),
            (MASKS_DIR, "21_training_mask.png"),
            (TARGETS_DIR, "21_manual1.png"),
        ] {
            image::GrayImage::new(4, 4)
                .save(dir.path().join(sub).join(file))
                .unwrap();
        }
        let split = DriveSplit::open(dir.path()).unwrap();

        assert!(split.load(0).is_ok());
        assert!(matches!(
            split.load(1),
            Err(DatasetError::IndexOutOfRange { index: 1, len: 1, .. })
        ));
    }
}
