/// Data loading for classification epochs
pub mod numpy_dataset;
pub mod tensor_loader;

pub use numpy_dataset::{DatasetMetadata, NumpyImageDataset};
pub use tensor_loader::TensorDataLoader;

use candle_core::{Device, Result, Tensor};

/// Generic data loader trait
pub trait BatchDataLoader {
    /// Get next batch of (samples, targets) tensors.
    ///
    /// Targets are `u32` class indices of shape `[batch]`.
    fn next_batch(&mut self, device: &Device) -> Result<Option<(Tensor, Tensor)>>;

    /// Reset loader for new epoch
    fn reset(&mut self);

    /// Get total number of batches
    fn num_batches(&self) -> usize;
}
