mod checkpoint;
mod config;
mod evaluate;
mod loss;
mod metrics;
mod output;
mod trainer;

pub use checkpoint::{
    CHECKPOINT_EXTENSION, CheckpointRecorder, checkpoint_path, load_checkpoint, save_checkpoint,
};
pub use config::{TESTING_SPLIT, TRAINING_SPLIT, TrainingConfig, VALIDATION_SPLIT, config_path};
pub use evaluate::{
    EvaluationConfig, EvaluationError, EvaluationReport, ImageReport, PREDICTIONS_DIR, evaluate,
    evaluate_model, predictions_path, render_panels,
};
pub use loss::{MaskedBceLoss, MaskedBceLossConfig};
pub use metrics::{ConfusionMatrix, MetricRecord, THRESHOLD};
pub use output::{SegmentationOutput, forward_segmentation};
pub use trainer::{EpochReport, TrainingError, TrainingSummary, fit, train, validate};
