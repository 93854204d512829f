/// Epoch-level training and evaluation for classifiers
pub mod accuracy;
pub mod engine;
pub mod loss;
pub mod metrics;

pub use accuracy::{correct_predictions, topk_accuracy};
pub use engine::{evaluate, train_one_epoch, train_one_epoch_distillation, TrainOutcome};
pub use loss::{cross_entropy, kd_loss, DistillationLoss};
pub use metrics::{EpochStats, MetricLogger, SmoothedValue};
