/// Configuration for the epoch loops
use std::path::Path;

/// Knowledge-distillation loss weighting
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DistillationConfig {
    /// Weight of the hard-label criterion term.
    /// The distillation term gets `1 - alpha`.
    pub alpha: f64,

    /// Softmax temperature applied to both student and teacher logits
    pub temperature: f64,
}

impl Default for DistillationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            temperature: 2.0,
        }
    }
}

/// Configuration shared by the training and evaluation loops
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Emit a progress line every N training batches
    pub train_print_freq: usize,

    /// Emit a progress line every N evaluation batches
    pub eval_print_freq: usize,

    /// Window size of smoothed meters (median / avg)
    pub metric_window: usize,

    /// Separator between meters in progress lines
    pub delimiter: String,

    /// Distillation loss settings
    pub distillation: DistillationConfig,

    /// Top-k accuracies reported by evaluation
    pub topk: Vec<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            train_print_freq: 100,
            eval_print_freq: 20,
            metric_window: 20,
            delimiter: "  ".to_string(),
            distillation: DistillationConfig::default(),
            topk: vec![1, 5],
        }
    }
}

impl EngineConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.train_print_freq == 0 || self.eval_print_freq == 0 {
            return Err(crate::EngineError::Config(
                "print frequencies must be > 0".to_string(),
            ));
        }

        if self.metric_window == 0 {
            return Err(crate::EngineError::Config(
                "metric_window must be > 0".to_string(),
            ));
        }

        let alpha = self.distillation.alpha;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(crate::EngineError::Config(format!(
                "Invalid distillation alpha: {}. Must be in [0, 1]",
                alpha
            )));
        }

        let temp = self.distillation.temperature;
        if !temp.is_finite() || temp <= 0.0 {
            return Err(crate::EngineError::Config(format!(
                "Invalid distillation temperature: {}. Must be finite and > 0",
                temp
            )));
        }

        if self.topk.is_empty() || self.topk.contains(&0) {
            return Err(crate::EngineError::Config(
                "topk must be non-empty and every k must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Load and validate a config from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.train_print_freq, 100);
        assert_eq!(config.eval_print_freq, 20);
        assert_eq!(config.topk, vec![1, 5]);
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let mut config = EngineConfig::default();
        config.distillation.alpha = 1.5;
        assert!(matches!(config.validate(), Err(crate::EngineError::Config(_))));
    }

    #[test]
    fn test_rejects_non_positive_temperature() {
        let mut config = EngineConfig::default();
        config.distillation.temperature = 0.0;
        assert!(config.validate().is_err());

        config.distillation.temperature = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_k() {
        let config = EngineConfig {
            topk: vec![1, 0],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "eval_print_freq": 5, "distillation": { "temperature": 4.0 } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.eval_print_freq, 5);
        assert_eq!(config.train_print_freq, 100);
        assert_eq!(config.distillation.temperature, 4.0);
        assert_eq!(config.distillation.alpha, 0.5);
    }

    #[test]
    fn test_from_json_file() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "topk": [1, 3] }"#)?;

        let config = EngineConfig::from_json_file(&path)?;
        assert_eq!(config.topk, vec![1, 3]);
        Ok(())
    }

    #[test]
    fn test_from_json_file_rejects_invalid_values() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "distillation": { "alpha": 2.0 } }"#)?;

        let result = EngineConfig::from_json_file(&path);
        assert!(matches!(result, Err(crate::EngineError::Config(_))));
        Ok(())
    }

    #[test]
    fn test_from_json_file_rejects_malformed_json() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "{ \"topk\": [1, ")?;

        let result = EngineConfig::from_json_file(&path);
        assert!(matches!(result, Err(crate::EngineError::Json(_))));
        Ok(())
    }
}
