/// Classification accuracy helpers
use candle_core::{DType, Result, Tensor, D};

/// Number of rows whose argmax equals the target
pub fn correct_predictions(logits: &Tensor, targets: &Tensor) -> Result<usize> {
    let predicted = logits.argmax(D::Minus1)?;
    let hits = predicted
        .eq(&targets.to_dtype(DType::U32)?)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()?;
    Ok(hits as usize)
}

/// Percentage (0-100) of samples whose target is within the top-k scores,
/// one entry per requested `k`.
///
/// `k` is clamped to the number of classes.
pub fn topk_accuracy(logits: &Tensor, targets: &Tensor, topk: &[usize]) -> Result<Vec<f64>> {
    let (batch_size, num_classes) = logits.dims2()?;
    if batch_size == 0 || num_classes == 0 || topk.is_empty() {
        return Ok(vec![0.0; topk.len()]);
    }

    let maxk = topk.iter().copied().max().unwrap_or(1).min(num_classes);
    let ranked = logits.contiguous()?.arg_sort_last_dim(false)?.narrow(1, 0, maxk)?;
    // [batch, maxk] of 0/1
    let matches = ranked
        .broadcast_eq(&targets.to_dtype(DType::U32)?.unsqueeze(1)?)?
        .to_dtype(DType::F32)?;

    topk.iter()
        .map(|&k| -> Result<f64> {
            let k = k.min(num_classes).max(1);
            let correct = matches.narrow(1, 0, k)?.sum_all()?.to_scalar::<f32>()? as f64;
            Ok(correct * 100.0 / batch_size as f64)
        })
        .collect()
}
