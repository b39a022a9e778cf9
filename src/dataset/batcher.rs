use burn::{data::dataloader::batcher::Batcher, prelude::*};

use super::PatchSample;

#[derive(Clone)]
pub struct PatchBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> PatchBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// A mini-batch of aligned patches.
///
/// - images: `[batch_size, 3, patch_size, patch_size]`
/// - masks: `[batch_size, 1, patch_size, patch_size]`, `{0, 1}`
/// - targets: `[batch_size, 1, patch_size, patch_size]`, `{0, 1}`
#[derive(Clone, Debug)]
pub struct PatchBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub masks: Tensor<B, 4>,
    pub targets: Tensor<B, 4>,
}

impl<B: Backend> Batcher<PatchSample, PatchBatch<B>> for PatchBatcher<B> {
    fn batch(&self, items: Vec<PatchSample>) -> PatchBatch<B> {
        let batch_size = items.len();

        let mut images = Vec::with_capacity(batch_size);
        let mut masks = Vec::with_capacity(batch_size);
        let mut targets = Vec::with_capacity(batch_size);

        for item in items {
            images.push(item.image.to_tensor::<B>(&self.device));
            masks.push(item.mask.to_tensor::<B>(&self.device));
            targets.push(item.target.to_tensor::<B>(&self.device));
        }

        PatchBatch {
            images: Tensor::stack::<4>(images, 0),
            masks: Tensor::stack::<4>(masks, 0),
            targets: Tensor::stack::<4>(targets, 0),
        }
    }
}
