/// Reference classifier used to drive the epoch loops
use candle_core::{Module, Result, Tensor};
use candle_nn::{linear, Dropout, Linear, ModuleT, VarBuilder};

pub mod loader;

pub use loader::load_classifier;

/// Shape of an [`MlpClassifier`]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MlpConfig {
    /// Flattened per-sample input size (C * H * W)
    pub input_dim: usize,

    /// Hidden layer width
    pub hidden_dim: usize,

    /// Number of output classes
    pub num_classes: usize,

    /// Dropout probability applied after the hidden activation
    pub dropout: f32,
}

impl MlpConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.input_dim == 0 || self.hidden_dim == 0 || self.num_classes == 0 {
            return Err(crate::EngineError::Config(
                "input_dim, hidden_dim and num_classes must be > 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(crate::EngineError::Config(format!(
                "Invalid dropout: {}. Must be in [0, 1)",
                self.dropout
            )));
        }

        Ok(())
    }
}

/// flatten -> linear -> relu -> dropout -> linear
pub struct MlpClassifier {
    fc1: Linear,
    fc2: Linear,
    dropout: Dropout,
}

impl MlpClassifier {
    pub fn new(config: &MlpConfig, vb: VarBuilder) -> crate::Result<Self> {
        config.validate()?;

        let fc1 = linear(config.input_dim, config.hidden_dim, vb.pp("fc1"))?;
        let fc2 = linear(config.hidden_dim, config.num_classes, vb.pp("fc2"))?;

        Ok(Self {
            fc1,
            fc2,
            dropout: Dropout::new(config.dropout),
        })
    }
}

impl ModuleT for MlpClassifier {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = xs.flatten_from(1)?;
        let xs = self.fc1.forward(&xs)?.relu()?;
        let xs = self.dropout.forward(&xs, train)?;
        self.fc2.forward(&xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn config() -> MlpConfig {
        MlpConfig {
            input_dim: 12,
            hidden_dim: 8,
            num_classes: 5,
            dropout: 0.5,
        }
    }

    #[test]
    fn test_output_shape() -> crate::Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = MlpClassifier::new(&config(), vb)?;

        let images = Tensor::randn(0f32, 1.0, (6, 3, 2, 2), &device)?;
        let logits = model.forward_t(&images, true)?;
        assert_eq!(logits.dims(), &[6, 5]);
        Ok(())
    }

    #[test]
    fn test_eval_mode_is_deterministic() -> crate::Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = MlpClassifier::new(&config(), vb)?;

        let images = Tensor::randn(0f32, 1.0, (4, 12), &device)?;
        let a = model.forward_t(&images, false)?;
        let b = model.forward_t(&images, false)?;
        let diff = (a - b)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_dropout() {
        let bad = MlpConfig {
            dropout: 1.0,
            ..config()
        };
        assert!(bad.validate().is_err());
    }
}
