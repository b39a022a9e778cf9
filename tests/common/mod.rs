#![allow(dead_code)]

use std::path::{Path, PathBuf};

use burn_retina::{
    dataset::{IMAGES_DIR, MASKS_DIR, TARGETS_DIR},
    training::{TESTING_SPLIT, TRAINING_SPLIT, VALIDATION_SPLIT},
};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Writes a DRIVE-shaped dataset with `count` synthetic `size x size` fundus
/// images per split and returns its root.
pub fn drive_dataset(root: &Path, size: u32, count: usize) -> PathBuf {
    for split in [TRAINING_SPLIT, VALIDATION_SPLIT, TESTING_SPLIT] {
        write_split(&root.join(split), split, size, count);
    }

    root.to_path_buf()
}

pub fn write_split(dir: &Path, split: &str, size: u32, count: usize) {
    for sub in [IMAGES_DIR, MASKS_DIR, TARGETS_DIR] {
        std::fs::create_dir_all(dir.join(sub)).unwrap();
    }

    for index in 0..count {
        let id = 21 + index;
        let (image, mask, target) = fundus(size, index as u32);

        image
            .save(dir.join(IMAGES_DIR).join(format!("{id}_{split}.png")))
            .unwrap();
        mask.save(dir.join(MASKS_DIR).join(format!("{id}_{split}_mask.png")))
            .unwrap();
        target
            .save(dir.join(TARGETS_DIR).join(format!("{id}_manual1.png")))
            .unwrap();
    }
}

/// A disc-shaped field of view crossed by a few dark vessels.
fn fundus(size: u32, variant: u32) -> (RgbImage, GrayImage, GrayImage) {
    let center = size as f32 / 2.0;
    let radius = center * 0.9;

    let inside = |x: u32, y: u32| {
        let (dx, dy) = (x as f32 - center, y as f32 - center);
        dx * dx + dy * dy <= radius * radius
    };
    let vessel = |x: u32, y: u32| {
        (x + variant) % 7 == 0 || (y + 2 * variant) % 9 == 0 || x.abs_diff(y) < 2
    };

    let mask = GrayImage::from_fn(size, size, |x, y| Luma([if inside(x, y) { 255 } else { 0 }]));
    let target = GrayImage::from_fn(size, size, |x, y| {
        Luma([if inside(x, y) && vessel(x, y) { 255 } else { 0 }])
    });
    let image = RgbImage::from_fn(size, size, |x, y| {
        if !inside(x, y) {
            Rgb([0, 0, 0])
        } else if vessel(x, y) {
            Rgb([90, 30, 10])
        } else {
            Rgb([200, (100 + (x * 3) % 50) as u8, 40])
        }
    });

    (image, mask, target)
}
