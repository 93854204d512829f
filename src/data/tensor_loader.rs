/// In-memory batch loader over a sample tensor and a label tensor
use candle_core::{DType, Device, Result, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Batches rows of `images` (`[N, ...]`) with their `labels` (`[N]`)
pub struct TensorDataLoader {
    images: Tensor,
    labels: Tensor,
    batch_size: usize,
    indices: Vec<u32>,
    current_idx: usize,
    shuffle: bool,
    rng: StdRng,
}

impl TensorDataLoader {
    /// Create new data loader. Integer labels are cast to `u32`;
    /// negative or floating-point labels are rejected.
    pub fn new(images: Tensor, labels: Tensor, batch_size: usize, shuffle: bool) -> crate::Result<Self> {
        Self::with_rng(images, labels, batch_size, shuffle, StdRng::from_entropy())
    }

    /// Create a loader whose shuffle order is reproducible
    pub fn with_seed(
        images: Tensor,
        labels: Tensor,
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> crate::Result<Self> {
        Self::with_rng(images, labels, batch_size, shuffle, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        images: Tensor,
        labels: Tensor,
        batch_size: usize,
        shuffle: bool,
        rng: StdRng,
    ) -> crate::Result<Self> {
        if batch_size == 0 {
            return Err(crate::EngineError::Config("batch_size must be > 0".to_string()));
        }

        if labels.rank() != 1 {
            return Err(crate::EngineError::Data(format!(
                "labels must be rank 1, got shape {:?}",
                labels.dims()
            )));
        }

        let num_samples = images.dim(0)?;
        if num_samples != labels.dim(0)? {
            return Err(crate::EngineError::Data(format!(
                "Sample count mismatch: images {} != labels {}",
                num_samples,
                labels.dim(0)?
            )));
        }

        let labels = match labels.dtype() {
            DType::U8 | DType::U32 => labels.to_dtype(DType::U32)?,
            DType::I64 => {
                if let Some(bad) = labels.to_vec1::<i64>()?.into_iter().find(|&l| l < 0) {
                    return Err(crate::EngineError::Data(format!("Negative label {}", bad)));
                }
                labels.to_dtype(DType::U32)?
            }
            other => {
                return Err(crate::EngineError::Data(format!(
                    "labels must be an integer dtype, got {:?}",
                    other
                )));
            }
        };

        let mut loader = Self {
            images,
            labels,
            batch_size,
            indices: (0..num_samples as u32).collect(),
            current_idx: 0,
            shuffle,
            rng,
        };
        if loader.shuffle {
            loader.indices.shuffle(&mut loader.rng);
        }

        Ok(loader)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl super::BatchDataLoader for TensorDataLoader {
    fn next_batch(&mut self, device: &Device) -> Result<Option<(Tensor, Tensor)>> {
        if self.current_idx >= self.indices.len() {
            return Ok(None);
        }

        let end_idx = (self.current_idx + self.batch_size).min(self.indices.len());
        let batch_indices = &self.indices[self.current_idx..end_idx];
        self.current_idx = end_idx;

        let index = Tensor::from_slice(batch_indices, batch_indices.len(), self.images.device())?;
        let samples = self.images.index_select(&index, 0)?.to_device(device)?;
        let targets = self.labels.index_select(&index, 0)?.to_device(device)?;

        Ok(Some((samples, targets)))
    }

    fn reset(&mut self) {
        self.current_idx = 0;

        if self.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
    }

    fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BatchDataLoader;

    fn toy_data(n: usize) -> Result<(Tensor, Tensor)> {
        let device = Device::Cpu;
        let images = Tensor::arange(0f32, (n * 4) as f32, &device)?.reshape((n, 1, 2, 2))?;
        let labels = Tensor::arange(0u32, n as u32, &device)?;
        Ok((images, labels))
    }

    #[test]
    fn test_partial_last_batch() -> crate::Result<()> {
        let (images, labels) = toy_data(5)?;
        let mut loader = TensorDataLoader::new(images, labels, 2, false)?;
        assert_eq!(loader.num_batches(), 3);

        let mut sizes = Vec::new();
        while let Some((samples, targets)) = loader.next_batch(&Device::Cpu)? {
            assert_eq!(&samples.dims()[1..], &[1, 2, 2]);
            sizes.push(targets.dim(0)?);
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        Ok(())
    }

    #[test]
    fn test_reset_restarts_epoch() -> crate::Result<()> {
        let (images, labels) = toy_data(3)?;
        let mut loader = TensorDataLoader::new(images, labels, 3, false)?;

        assert!(loader.next_batch(&Device::Cpu)?.is_some());
        assert!(loader.next_batch(&Device::Cpu)?.is_none());

        loader.reset();
        let (_, targets) = loader.next_batch(&Device::Cpu)?.unwrap();
        assert_eq!(targets.to_vec1::<u32>()?, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_shuffle_keeps_pairs_aligned() -> crate::Result<()> {
        let (images, labels) = toy_data(8)?;
        let mut loader = TensorDataLoader::with_seed(images, labels, 8, true, 7)?;

        let (samples, targets) = loader.next_batch(&Device::Cpu)?.unwrap();
        let firsts = samples.flatten_from(1)?.narrow(1, 0, 1)?.squeeze(1)?.to_vec1::<f32>()?;
        let targets = targets.to_vec1::<u32>()?;

        for (value, label) in firsts.iter().zip(targets.iter()) {
            assert_eq!(*value, (*label * 4) as f32);
        }

        let mut sorted = targets.clone();
        sorted.sort();
        assert_eq!(sorted, (0..8).collect::<Vec<u32>>());
        Ok(())
    }

    #[test]
    fn test_rejects_count_mismatch() -> Result<()> {
        let device = Device::Cpu;
        let images = Tensor::zeros((4, 3), DType::F32, &device)?;
        let labels = Tensor::zeros(3, DType::U32, &device)?;

        let result = TensorDataLoader::new(images, labels, 2, false);
        assert!(matches!(result, Err(crate::EngineError::Data(_))));
        Ok(())
    }

    #[test]
    fn test_rejects_negative_labels() -> Result<()> {
        let device = Device::Cpu;
        let images = Tensor::zeros((2, 3), DType::F32, &device)?;
        let labels = Tensor::new(&[0i64, -1], &device)?;

        let result = TensorDataLoader::new(images, labels, 2, false);
        assert!(matches!(result, Err(crate::EngineError::Data(_))));
        Ok(())
    }

    #[test]
    fn test_rejects_float_labels() -> Result<()> {
        let device = Device::Cpu;
        let images = Tensor::zeros((2, 3), DType::F32, &device)?;
        let labels = Tensor::new(&[0f32, 1.0], &device)?;

        let result = TensorDataLoader::new(images, labels, 2, false);
        assert!(matches!(result, Err(crate::EngineError::Data(_))));
        Ok(())
    }

    #[test]
    fn test_accepts_non_negative_i64_labels() -> crate::Result<()> {
        let device = Device::Cpu;
        let images = Tensor::zeros((2, 3), DType::F32, &device)?;
        let labels = Tensor::new(&[2i64, 0], &device)?;

        let mut loader = TensorDataLoader::new(images, labels, 2, false)?;
        let (_, targets) = loader.next_batch(&device)?.unwrap();
        assert_eq!(targets.to_vec1::<u32>()?, vec![2, 0]);
        Ok(())
    }
}
