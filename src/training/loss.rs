/// Supervised and knowledge-distillation losses
use candle_core::{Result, Tensor, D};
use candle_nn::{loss, ops};

use crate::config::DistillationConfig;

/// Mean cross-entropy of `logits` `[batch, classes]` against `u32` targets `[batch]`
pub fn cross_entropy(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    loss::cross_entropy(logits, targets)
}

/// Temperature-scaled KL divergence from the teacher to the student.
///
/// `KL(softmax(t / T) || softmax(s / T))` summed over classes and batch,
/// divided by the batch size, then scaled by `T²` so gradient magnitudes
/// stay comparable across temperatures.
pub fn kd_loss(student_logits: &Tensor, teacher_logits: &Tensor, temperature: f64) -> Result<Tensor> {
    let batch_size = student_logits.dim(0)?;

    let student_log_probs = ops::log_softmax(&(student_logits / temperature)?, D::Minus1)?;
    let teacher_scaled = (teacher_logits / temperature)?;
    let teacher_probs = ops::softmax(&teacher_scaled, D::Minus1)?;
    let teacher_log_probs = ops::log_softmax(&teacher_scaled, D::Minus1)?;

    // p * (log p - log q); softmax never yields exact zeros for finite logits
    let pointwise = (teacher_probs * (teacher_log_probs - student_log_probs)?)?;
    let kl = (pointwise.sum_all()? / batch_size as f64)?;

    kl * (temperature * temperature)
}

/// `alpha * criterion(student, targets) + (1 - alpha) * KD(student, teacher)`
#[derive(Debug, Clone, Copy)]
pub struct DistillationLoss {
    pub alpha: f64,
    pub temperature: f64,
}

impl DistillationLoss {
    pub fn new(alpha: f64, temperature: f64) -> Self {
        Self { alpha, temperature }
    }

    /// Combined loss with `criterion` as the hard-label term.
    /// Teacher logits are detached from the graph.
    pub fn compute<C>(
        &self,
        criterion: &C,
        student_logits: &Tensor,
        teacher_logits: &Tensor,
        targets: &Tensor,
    ) -> Result<Tensor>
    where
        C: Fn(&Tensor, &Tensor) -> Result<Tensor> + ?Sized,
    {
        let teacher_logits = teacher_logits.detach();

        let loss_ce = criterion(student_logits, targets)?;
        let loss_kd = kd_loss(student_logits, &teacher_logits, self.temperature)?;

        (loss_ce * self.alpha)? + (loss_kd * (1.0 - self.alpha))?
    }
}

impl From<&DistillationConfig> for DistillationLoss {
    fn from(config: &DistillationConfig) -> Self {
        Self::new(config.alpha, config.temperature)
    }
}
