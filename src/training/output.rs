use burn::prelude::*;
use derive_new::new;

use super::MaskedBceLoss;
use crate::{dataset::PatchBatch, model::Segmenter};

/// Result of one supervised forward pass.
#[derive(new)]
pub struct SegmentationOutput<B: Backend> {
    /// Loss summed over every supervised stage.
    pub loss: Tensor<B, 1>,
    /// Probabilities of the last stage, `[batch_size, 1, height, width]`.
    pub output: Tensor<B, 4>,
    pub targets: Tensor<B, 4>,
    pub masks: Tensor<B, 4>,
}

pub fn forward_segmentation<B: Backend, M: Segmenter<B>>(
    model: &M,
    loss: &MaskedBceLoss<B>,
    batch: PatchBatch<B>,
) -> SegmentationOutput<B> {
    let mut stages = model.segment_stages(batch.images);
    let total = loss.forward_stages(stages.clone(), batch.targets.clone(), batch.masks.clone());
    let output = stages
        .pop()
        .unwrap_or_else(|| batch.targets.zeros_like());

    SegmentationOutput::new(total, output, batch.targets, batch.masks)
}
