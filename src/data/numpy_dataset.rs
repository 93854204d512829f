/// NumPy image-classification dataset (.npy format)
use candle_core::{Device, Tensor};
use ndarray::{Array1, ArrayD};
use ndarray_npy::ReadNpyExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::TensorDataLoader;

/// Metadata from dataset.json
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetMetadata {
    pub num_classes: usize,
    #[serde(default)]
    pub num_examples: usize,
    #[serde(default)]
    pub description: String,
}

/// Images and labels loaded from `images.npy` / `labels.npy`
pub struct NumpyImageDataset {
    images: ArrayD<f32>, // [N, ...]
    labels: Array1<i64>, // [N]
    metadata: DatasetMetadata,
}

impl NumpyImageDataset {
    /// Load from directory containing .npy files and an optional dataset.json
    pub fn from_directory<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let dir = path.as_ref();

        log::info!("Loading NumPy dataset from: {:?}", dir);

        let images_path = dir.join("images.npy");
        let images = <ArrayD<f32> as ReadNpyExt>::read_npy(File::open(&images_path)?)
            .map_err(|e| crate::EngineError::Data(format!("Failed to read images.npy: {}", e)))?;

        let labels_path = dir.join("labels.npy");
        let labels = <Array1<i64> as ReadNpyExt>::read_npy(File::open(&labels_path)?)
            .map_err(|e| crate::EngineError::Data(format!("Failed to read labels.npy: {}", e)))?;

        log::info!("Loaded images: shape {:?}, labels: {}", images.shape(), labels.len());

        let metadata_path = dir.join("dataset.json");
        let metadata = if metadata_path.exists() {
            let file = File::open(&metadata_path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            let num_classes = labels.iter().copied().max().map_or(0, |m| (m + 1).max(0)) as usize;
            log::warn!("dataset.json not found, inferring num_classes={} from labels", num_classes);
            DatasetMetadata {
                num_classes,
                num_examples: labels.len(),
                description: "Unknown".to_string(),
            }
        };

        Self::from_arrays(images, labels, metadata)
    }

    /// Build from in-memory arrays, validating shapes, label range and
    /// the declared example count (0 means undeclared)
    pub fn from_arrays(
        images: ArrayD<f32>,
        labels: Array1<i64>,
        metadata: DatasetMetadata,
    ) -> crate::Result<Self> {
        if images.ndim() < 2 {
            return Err(crate::EngineError::Data(format!(
                "images must have rank >= 2, got shape {:?}",
                images.shape()
            )));
        }

        if images.shape()[0] != labels.len() {
            return Err(crate::EngineError::Data(format!(
                "Sample count mismatch: images {} != labels {}",
                images.shape()[0],
                labels.len()
            )));
        }

        if metadata.num_examples != 0 && metadata.num_examples != labels.len() {
            return Err(crate::EngineError::Data(format!(
                "dataset.json declares {} examples, found {}",
                metadata.num_examples,
                labels.len()
            )));
        }

        if let Some(bad) = labels
            .iter()
            .find(|&&l| l < 0 || l as usize >= metadata.num_classes)
        {
            return Err(crate::EngineError::Data(format!(
                "Label {} outside [0, {})",
                bad, metadata.num_classes
            )));
        }

        log::info!(
            "Dataset loaded: {} examples, sample shape {:?}, num_classes={}",
            labels.len(),
            &images.shape()[1..],
            metadata.num_classes
        );

        Ok(Self {
            images,
            labels,
            metadata,
        })
    }

    /// Get number of examples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Get number of classes
    pub fn num_classes(&self) -> usize {
        self.metadata.num_classes
    }

    /// Per-sample shape (without the leading batch axis)
    pub fn sample_shape(&self) -> &[usize] {
        &self.images.shape()[1..]
    }

    /// Get metadata
    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Convert into CPU tensors `(images, labels)`
    pub fn to_tensors(&self) -> crate::Result<(Tensor, Tensor)> {
        let device = Device::Cpu;
        let data: Vec<f32> = self.images.iter().copied().collect();
        let images = Tensor::from_vec(data, self.images.shape(), &device)?;

        let labels: Vec<u32> = self.labels.iter().map(|&l| l as u32).collect();
        let labels = Tensor::from_vec(labels, self.labels.len(), &device)?;

        Ok((images, labels))
    }

    /// Wrap the dataset in a batch loader
    pub fn into_loader(self, batch_size: usize, shuffle: bool) -> crate::Result<TensorDataLoader> {
        let (images, labels) = self.to_tensors()?;
        TensorDataLoader::new(images, labels, batch_size, shuffle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BatchDataLoader;
    use ndarray::IxDyn;
    use ndarray_npy::WriteNpyExt;

    #[test]
    fn test_metadata_deserialization() {
        let json = r#"{
            "num_classes": 10,
            "num_examples": 50000,
            "description": "CIFAR-10 train"
        }"#;

        let metadata: DatasetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.num_classes, 10);
        assert_eq!(metadata.num_examples, 50000);
    }

    #[test]
    fn test_load_directory_without_metadata() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        let images = ArrayD::<f32>::from_shape_fn(IxDyn(&[4, 1, 2, 2]), |idx| idx[0] as f32);
        images.write_npy(File::create(dir.path().join("images.npy"))?).unwrap();
        let labels = Array1::<i64>::from(vec![0, 2, 1, 2]);
        labels.write_npy(File::create(dir.path().join("labels.npy"))?).unwrap();

        let dataset = NumpyImageDataset::from_directory(dir.path())?;
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.num_classes(), 3);
        assert_eq!(dataset.sample_shape(), &[1, 2, 2]);

        let mut loader = dataset.into_loader(4, false)?;
        let (samples, targets) = loader.next_batch(&Device::Cpu)?.unwrap();
        assert_eq!(samples.dims(), &[4, 1, 2, 2]);
        assert_eq!(targets.to_vec1::<u32>()?, vec![0, 2, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_rejects_out_of_range_label() {
        let images = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        let labels = Array1::<i64>::from(vec![0, 5]);
        let metadata = DatasetMetadata {
            num_classes: 3,
            num_examples: 2,
            description: String::new(),
        };

        let result = NumpyImageDataset::from_arrays(images, labels, metadata);
        assert!(matches!(result, Err(crate::EngineError::Data(_))));
    }

    #[test]
    fn test_rejects_example_count_mismatch() {
        let images = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        let labels = Array1::<i64>::from(vec![0, 1]);
        let metadata = DatasetMetadata {
            num_classes: 3,
            num_examples: 5,
            description: String::new(),
        };

        let result = NumpyImageDataset::from_arrays(images, labels, metadata);
        assert!(matches!(result, Err(crate::EngineError::Data(_))));
    }

    #[test]
    fn test_undeclared_example_count_is_accepted() -> crate::Result<()> {
        let images = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        let labels = Array1::<i64>::from(vec![0, 1]);
        let metadata = DatasetMetadata {
            num_classes: 3,
            num_examples: 0,
            description: String::new(),
        };

        let dataset = NumpyImageDataset::from_arrays(images, labels, metadata)?;
        assert_eq!(dataset.len(), 2);
        Ok(())
    }
}
