use std::marker::PhantomData;

use burn::prelude::*;

#[derive(Config, Debug)]
pub struct MaskedBceLossConfig {
    /// Predictions are clamped to `[epsilon, 1 - epsilon]` before the log.
    #[config(default = 1e-7)]
    pub epsilon: f64,
}

impl MaskedBceLossConfig {
    pub fn init<B: Backend>(&self) -> MaskedBceLoss<B> {
        self.assertions();
        MaskedBceLoss {
            epsilon: self.epsilon,
            _b: PhantomData,
        }
    }

    fn assertions(&self) {
        assert!(
            self.epsilon > 0. && self.epsilon < 0.5,
            "Epsilon must lie in (0, 0.5). Got {}",
            self.epsilon
        );
    }
}

/// Binary cross-entropy between vessel probabilities and the annotation, with
/// both zeroed outside the field of view first.
///
/// Masked-out pixels contribute `-ln(1 - epsilon)` whatever their annotation.
#[derive(Module, Debug)]
pub struct MaskedBceLoss<B: Backend> {
    pub epsilon: f64,
    _b: PhantomData<B>,
}

impl<B: Backend> MaskedBceLoss<B> {
    /// Mean loss over every pixel of the batch.
    ///
    /// - predictions: `[batch_size, 1, height, width]`, probabilities
    /// - targets: `[batch_size, 1, height, width]`, `{0, 1}`
    /// - masks: `[batch_size, 1, height, width]`, `{0, 1}`
    pub fn forward(
        &self,
        predictions: Tensor<B, 4>,
        targets: Tensor<B, 4>,
        masks: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        self.assertions(&predictions, &targets, &masks);

        let targets = targets * masks.clone();
        let probabilities = (predictions * masks).clamp(self.epsilon, 1.0 - self.epsilon);

        let positive = targets.clone() * probabilities.clone().log();
        let negative =
            (targets.ones_like() - targets) * (probabilities.ones_like() - probabilities).log();

        (positive + negative).neg().mean()
    }

    /// Sum of the loss of every supervised stage against the same annotation.
    pub fn forward_stages(
        &self,
        stages: Vec<Tensor<B, 4>>,
        targets: Tensor<B, 4>,
        masks: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        assert!(!stages.is_empty(), "At least one prediction is required");

        stages
            .into_iter()
            .map(|stage| self.forward(stage, targets.clone(), masks.clone()))
            .reduce(|total, loss| total + loss)
            .unwrap_or_else(|| Tensor::zeros([1], &targets.device()))
    }

    fn assertions(&self, predictions: &Tensor<B, 4>, targets: &Tensor<B, 4>, masks: &Tensor<B, 4>) {
        let predictions_dims = predictions.dims();

        assert!(
            predictions_dims == targets.dims(),
            "Shape mismatch: predictions {:?} vs targets {:?}",
            predictions_dims,
            targets.dims()
        );

        assert!(
            predictions_dims == masks.dims(),
            "Shape mismatch: predictions {:?} vs masks {:?}",
            predictions_dims,
            masks.dims()
        );
    }
}
