use std::path::Path;

use burn::data::dataset::{Dataset, InMemDataset};
use burn::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use super::{DatasetError, DriveSplit, RetinaImage, RetinaTriple, TransformConfig};

/// Aligned crops of one source image: the photograph, its FOV mask and its
/// vessel annotation, all taken from the same window.
#[derive(Clone, Debug)]
pub struct PatchSample {
    pub image: RetinaImage,
    pub mask: RetinaImage,
    pub target: RetinaImage,
}

#[derive(Config, Debug)]
pub struct PatchConfig {
    #[config(default = 48)]
    pub patch_size: usize,
    #[config(default = 1000)]
    pub patches_per_image: usize,
    #[config(default = "TransformConfig::new()")]
    pub transform: TransformConfig,
}

/// Draws `count` random `size x size` windows from a triple and crops all
/// three planes at each of them.
///
/// Window positions are uniform over every placement that fits inside the
/// image, and each position is drawn once and shared by the three crops.
pub fn sample_aligned_patches<R: Rng>(
    triple: &RetinaTriple,
    size: usize,
    count: usize,
    rng: &mut R,
) -> Result<Vec<PatchSample>, DatasetError> {
    let (height, width) = (triple.image.height(), triple.image.width());
    if size == 0 || size > height || size > width {
        return Err(DatasetError::WindowTooLarge {
            height: size,
            width: size,
            image_height: height,
            image_width: width,
        });
    }

    let mut patches = Vec::with_capacity(count);
    for _ in 0..count {
        let top = rng.gen_range(0..=height - size);
        let left = rng.gen_range(0..=width - size);

        patches.push(PatchSample {
            image: triple.image.crop(top, left, size, size)?,
            mask: triple.mask.crop(top, left, size, size)?,
            target: triple.target.crop(top, left, size, size)?,
        });
    }

    Ok(patches)
}

/// In-memory patch dataset rebuilt from the source images at every epoch.
pub struct PatchDataset {
    dataset: InMemDataset<PatchSample>,
}

impl PatchDataset {
    pub fn from_folder<P: AsRef<Path>>(
        root: P,
        config: &PatchConfig,
        seed: u64,
    ) -> Result<Self, DatasetError> {
        let split = DriveSplit::open(root)?;
        let triples = split.load_all()?;
        let dataset = Self::from_triples(&triples, config, seed)?;

        info!(
            "Extracted {} patches from {} images in {}",
            dataset.len(),
            split.len(),
            split.root().display()
        );

        Ok(dataset)
    }

    /// Source image `i` is transformed and sampled with an RNG seeded by
    /// `seed + i`, so a given seed always reproduces the same patches.
    pub fn from_triples(
        triples: &[RetinaTriple],
        config: &PatchConfig,
        seed: u64,
    ) -> Result<Self, DatasetError> {
        let mut samples = Vec::with_capacity(triples.len() * config.patches_per_image);

        for (index, triple) in triples.iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
            let triple = config.transform.apply(triple, &mut rng)?;

            samples.extend(sample_aligned_patches(
                &triple,
                config.patch_size,
                config.patches_per_image,
                &mut rng,
            )?);
        }

        Ok(Self {
            dataset: InMemDataset::new(samples),
        })
    }
}

impl Dataset<PatchSample> for PatchDataset {
    fn get(&self, index: usize) -> Option<PatchSample> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}
