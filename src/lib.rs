//! Epoch engine - training and evaluation loops for image classifiers
//!
//! Thin orchestration over `candle`: sequences batches, runs forward and
//! backward passes, composes supervised and distillation losses, and
//! aggregates running metrics.
//!
//! # Loops
//!
//! - **train_one_epoch**: supervised training against a caller-supplied criterion
//! - **train_one_epoch_distillation**: student training against a frozen teacher
//! - **evaluate**: loss and top-k accuracy without parameter updates
//!
//! # Example
//!
//! ```ignore
//! use epoch_engine::{EngineConfig, training::{cross_entropy, train_one_epoch}};
//!
//! let config = EngineConfig::default();
//! let outcome = train_one_epoch(&model, &cross_entropy, &mut loader, &mut optimizer, &device, 0, &config)?;
//! println!("train acc {:.2}%", outcome.accuracy);
//! ```

pub mod config;
pub mod data;
pub mod models;
pub mod training;

// Re-export commonly used items
pub use config::{DistillationConfig, EngineConfig};
pub use training::{evaluate, train_one_epoch, train_one_epoch_distillation, EpochStats, TrainOutcome};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Loss is {value}, stopping training at epoch {epoch}")]
    NonFiniteLoss { epoch: usize, value: f64 },

    #[error("No samples seen during {0}")]
    EmptyEpoch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
