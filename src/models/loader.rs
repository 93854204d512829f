/// Weight loading from safetensors files
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use std::path::Path;

use super::{MlpClassifier, MlpConfig};

/// Load a frozen classifier (e.g. a distillation teacher) from a safetensors file
///
/// # Arguments
/// * `config` - Model configuration
/// * `weights_path` - Path to safetensors file
/// * `device` - Device to load model on
pub fn load_classifier<P: AsRef<Path>>(
    config: &MlpConfig,
    weights_path: P,
    device: &Device,
) -> crate::Result<MlpClassifier> {
    log::info!("Loading classifier weights from {:?}", weights_path.as_ref());

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path.as_ref()], DType::F32, device)?
    };

    MlpClassifier::new(config, vb)
}
