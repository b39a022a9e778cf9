use burn::prelude::*;
use rand::Rng;

use super::{DatasetError, RetinaTriple};

/// Transform applied identically to an image, its mask and its annotation.
///
/// Random decisions are drawn once per triple, so the three planes stay
/// pixel-aligned.
#[derive(Config, Debug)]
pub struct TransformConfig {
    pub center_crop: Option<usize>,
    #[config(default = false)]
    pub horizontal_flip: bool,
    #[config(default = false)]
    pub vertical_flip: bool,
}

impl TransformConfig {
    /// Random flips with probability 0.5 each. Training uses the identity
    /// transform unless augmentation is requested.
    pub fn augmented() -> Self {
        Self::new()
            .with_horizontal_flip(true)
            .with_vertical_flip(true)
    }

    pub fn apply<R: Rng>(
        &self,
        triple: &RetinaTriple,
        rng: &mut R,
    ) -> Result<RetinaTriple, DatasetError> {
        let mut triple = match self.center_crop {
            Some(size) => triple.map(|plane| plane.center_crop(size))?,
            None => triple.clone(),
        };

        if self.horizontal_flip && rng.gen_bool(0.5) {
            triple = triple.map(|plane| Ok(plane.flip_horizontal()))?;
        }
        if self.vertical_flip && rng.gen_bool(0.5) {
            triple = triple.map(|plane| Ok(plane.flip_vertical()))?;
        }

        Ok(triple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RetinaImage;
    use rand::{SeedableRng, rngs::StdRng};

    fn triple() -> RetinaTriple {
        let plane = |offset: f32| {
            RetinaImage::new(1, 4, 4, (0..16).map(|i| i as f32 + offset).collect())
        };

        RetinaTriple {
            name: "01".to_string(),
            image: plane(0.0),
            mask: plane(100.0),
            target: plane(200.0),
        }
    }

    #[test]
    fn flips_every_plane_the_same_way() {
        let config = TransformConfig::augmented();

        for seed in 0..16 {
            let out = config.apply(&triple(), &mut StdRng::seed_from_u64(seed)).unwrap();

            let (image, mask, target) =
                (out.image.to_vec(), out.mask.to_vec(), out.target.to_vec());
            for i in 0..16 {
                assert_eq!(mask[i], image[i] + 100.0);
                assert_eq!(target[i], image[i] + 200.0);
            }
        }
    }

    #[test]
    fn identity_by_default() {
        let config = TransformConfig::new();

        let out = config.apply(&triple(), &mut StdRng::seed_from_u64(7)).unwrap();

        assert_eq!(out.image, triple().image);
    }

    #[test]
    fn center_crop_applies_to_all_planes() {
        let config = TransformConfig::new().with_center_crop(Some(2));

        let out = config.apply(&triple(), &mut StdRng::seed_from_u64(0)).unwrap();

        assert_eq!(out.image.to_vec(), vec![5.0, 6.0, 9.0, 10.0]);
        assert_eq!(out.target.to_vec(), vec![205.0, 206.0, 209.0, 210.0]);
    }
}
