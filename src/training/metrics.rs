use std::fmt;

use burn::prelude::*;

/// Probabilities at or above this value are classified as vessel.
pub const THRESHOLD: f64 = 0.5;

/// Pixel counts of a binarized prediction against its annotation, restricted
/// to the field of view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positive: u64,
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
}

impl ConfusionMatrix {
    pub fn new(
        true_positive: u64,
        true_negative: u64,
        false_positive: u64,
        false_negative: u64,
    ) -> Self {
        Self {
            true_positive,
            true_negative,
            false_positive,
            false_negative,
        }
    }

    /// Counts over every element of the tensors. `predictions` are
    /// probabilities, `targets` and `mask` are `{0, 1}`; only pixels where the
    /// mask is set are counted.
    pub fn from_predictions<B: Backend, const D: usize>(
        predictions: Tensor<B, D>,
        targets: Tensor<B, D>,
        mask: Tensor<B, D>,
    ) -> Self {
        let numel = predictions.shape().num_elements();
        let counts = Self::count(
            predictions.reshape([1, numel]),
            targets.reshape([1, numel]),
            mask.reshape([1, numel]),
        );

        counts[0]
    }

    /// One matrix per sample of a `[batch, channels, height, width]` batch.
    pub fn per_sample<B: Backend>(
        predictions: Tensor<B, 4>,
        targets: Tensor<B, 4>,
        mask: Tensor<B, 4>,
    ) -> Vec<Self> {
        let [batch_size, channels, height, width] = predictions.dims();
        let shape = [batch_size, channels * height * width];

        Self::count(
            predictions.reshape(shape),
            targets.reshape(shape),
            mask.reshape(shape),
        )
    }

    fn count<B: Backend>(
        predictions: Tensor<B, 2>,
        targets: Tensor<B, 2>,
        mask: Tensor<B, 2>,
    ) -> Vec<Self> {
        let valid = mask.greater_elem(0.5).float();
        let predicted = predictions.greater_equal_elem(THRESHOLD).float() * valid.clone();
        let actual = targets.greater_elem(0.5).float() * valid.clone();

        let hits = (predicted.clone() * actual.clone()).sum_dim(1);
        let predicted_positive = predicted.sum_dim(1);
        let actual_positive = actual.sum_dim(1);
        let total = valid.sum_dim(1);

        let column = |tensor: Tensor<B, 2>| -> Vec<u64> {
            tensor
                .into_data()
                .iter::<f64>()
                .map(|count| count.round() as u64)
                .collect()
        };

        let hits = column(hits);
        let predicted_positive = column(predicted_positive);
        let actual_positive = column(actual_positive);
        let total = column(total);

        (0..hits.len())
            .map(|i| {
                let true_positive = hits[i];
                let false_positive = predicted_positive[i] - true_positive;
                let false_negative = actual_positive[i] - true_positive;
                let true_negative = total[i] - true_positive - false_positive - false_negative;

                Self::new(true_positive, true_negative, false_positive, false_negative)
            })
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }
}

/// Segmentation quality of one image (or the mean over several).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricRecord {
    pub f1: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub accuracy: f64,
    pub auc: f64,
    pub precision: f64,
    pub recall: f64,
}

impl MetricRecord {
    /// Ratios with an empty denominator are reported as 0.
    ///
    /// Predictions are binary, so the ROC curve has the single operating point
    /// (1 - specificity, sensitivity) and its area is the mean of sensitivity
    /// and specificity.
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let tp = matrix.true_positive as f64;
        let tn = matrix.true_negative as f64;
        let fp = matrix.false_positive as f64;
        let fn_ = matrix.false_negative as f64;

        let accuracy = ratio(tp + tn, tp + tn + fp + fn_);
        let sensitivity = ratio(tp, tp + fn_);
        let specificity = ratio(tn, tn + fp);
        let precision = ratio(tp, tp + fp);
        let recall = sensitivity;
        let f1 = ratio(2.0 * precision * recall, precision + recall);
        let auc = (sensitivity + specificity) / 2.0;

        Self {
            f1,
            sensitivity,
            specificity,
            accuracy,
            auc,
            precision,
            recall,
        }
    }

    /// Arithmetic mean of every field. An empty slice gives all zeros.
    pub fn mean(records: &[MetricRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let n = records.len() as f64;
        let sum = |field: fn(&MetricRecord) -> f64| records.iter().map(field).sum::<f64>() / n;

        Self {
            f1: sum(|r| r.f1),
            sensitivity: sum(|r| r.sensitivity),
            specificity: sum(|r| r.specificity),
            accuracy: sum(|r| r.accuracy),
            auc: sum(|r| r.auc),
            precision: sum(|r| r.precision),
            recall: sum(|r| r.recall),
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.f1,
            self.sensitivity,
            self.specificity,
            self.accuracy,
            self.auc,
            self.precision,
            self.recall,
        ]
        .iter()
        .all(|value| value.is_finite())
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "F1:{:.4}, Precision:{:.4}, Recall:{:.4}, AC:{:.4}, AUC:{:.4}",
            self.f1, self.precision, self.recall, self.accuracy, self.auc
        )
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
