/// Epoch loops: supervised training, distillation training, evaluation
use candle_core::{DType, Device, Tensor};
use candle_nn::{ModuleT, Optimizer};

use crate::config::EngineConfig;
use crate::data::BatchDataLoader;
use crate::{EngineError, Result};
use super::accuracy::{correct_predictions, topk_accuracy};
use super::loss::DistillationLoss;
use super::metrics::{EpochStats, MetricLogger};

/// Result of one training epoch
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Global averages of the epoch's meters (`loss`)
    pub stats: EpochStats,
    /// Top-1 training accuracy over the epoch, in percent
    pub accuracy: f64,
}

fn scalar(t: &Tensor) -> candle_core::Result<f64> {
    t.to_dtype(DType::F64)?.to_scalar::<f64>()
}

/// Shared batch loop for both training variants.
///
/// `forward` returns `(logits, loss)` for a batch already on `device`.
fn run_training_epoch<L, O, F>(
    data_loader: &mut L,
    optimizer: &mut O,
    device: &Device,
    epoch: usize,
    config: &EngineConfig,
    mut forward: F,
) -> Result<TrainOutcome>
where
    L: BatchDataLoader + ?Sized,
    O: Optimizer,
    F: FnMut(&Tensor, &Tensor) -> candle_core::Result<(Tensor, Tensor)>,
{
    config.validate()?;

    let header = format!("Epoch: [{}]", epoch);
    let mut metric_logger = MetricLogger::new(config.delimiter.clone(), config.metric_window);

    let mut total_correct = 0usize;
    let mut total_samples = 0usize;

    data_loader.reset();
    let total = data_loader.num_batches();
    let mut batch_idx = 0;

    while let Some((samples, targets)) = data_loader.next_batch(device)? {
        metric_logger.data_loaded();

        let (outputs, loss) = forward(&samples, &targets)?;
        let loss_value = scalar(&loss)?;

        if !loss_value.is_finite() {
            log::error!("Loss is {}, stopping training", loss_value);
            return Err(EngineError::NonFiniteLoss {
                epoch,
                value: loss_value,
            });
        }

        // gradients are recomputed from scratch on every call
        optimizer.backward_step(&loss)?;
        device.synchronize()?;

        metric_logger.update("loss", loss_value);

        total_correct += correct_predictions(&outputs, &targets)?;
        total_samples += targets.dim(0)?;

        metric_logger.step(&header, batch_idx, total, config.train_print_freq);
        batch_idx += 1;
    }

    metric_logger.finish(&header, batch_idx);

    if total_samples == 0 {
        return Err(EngineError::EmptyEpoch(header));
    }

    let accuracy = 100.0 * total_correct as f64 / total_samples as f64;
    log::info!("Epoch: [{}] Training Accuracy: {:.2}%", epoch, accuracy);
    log::info!("Averaged stats: {}", metric_logger);

    Ok(TrainOutcome {
        stats: metric_logger.global_averages(),
        accuracy,
    })
}

/// Train `model` for one epoch, scoring each batch with `criterion`
/// (typically [`cross_entropy`](super::loss::cross_entropy))
pub fn train_one_epoch<M, C, L, O>(
    model: &M,
    criterion: &C,
    data_loader: &mut L,
    optimizer: &mut O,
    device: &Device,
    epoch: usize,
    config: &EngineConfig,
) -> Result<TrainOutcome>
where
    M: ModuleT + ?Sized,
    C: Fn(&Tensor, &Tensor) -> candle_core::Result<Tensor> + ?Sized,
    L: BatchDataLoader + ?Sized,
    O: Optimizer,
{
    run_training_epoch(data_loader, optimizer, device, epoch, config, |samples, targets| {
        let outputs = model.forward_t(samples, true)?;
        let loss = criterion(&outputs, targets)?;
        Ok((outputs, loss))
    })
}

/// Train `student` for one epoch against a frozen `teacher`.
///
/// The loss blends the hard-label `criterion` and temperature-scaled KL
/// divergence using `config.distillation`. Only the variables held by
/// `optimizer` are updated; teacher outputs never carry gradients.
#[allow(clippy::too_many_arguments)]
pub fn train_one_epoch_distillation<T, S, C, L, O>(
    teacher: &T,
    student: &S,
    criterion: &C,
    data_loader: &mut L,
    optimizer: &mut O,
    device: &Device,
    epoch: usize,
    config: &EngineConfig,
) -> Result<TrainOutcome>
where
    T: ModuleT + ?Sized,
    S: ModuleT + ?Sized,
    C: Fn(&Tensor, &Tensor) -> candle_core::Result<Tensor> + ?Sized,
    L: BatchDataLoader + ?Sized,
    O: Optimizer,
{
    let distill = DistillationLoss::from(&config.distillation);
    log::debug!(
        "Distillation alpha={}, temperature={}",
        distill.alpha,
        distill.temperature
    );

    run_training_epoch(data_loader, optimizer, device, epoch, config, |samples, targets| {
        let outputs = student.forward_t(samples, true)?;
        let outputs_teacher = teacher.forward_t(samples, false)?.detach();
        let loss = distill.compute(criterion, &outputs, &outputs_teacher, targets)?;
        Ok((outputs, loss))
    })
}

/// Evaluate `model` without updating it.
///
/// Returns global averages for `loss` (per batch, from `criterion`) and `acc{k}` for every
/// configured `k` (weighted by batch size, in percent).
pub fn evaluate<M, C, L>(
    data_loader: &mut L,
    model: &M,
    criterion: &C,
    device: &Device,
    config: &EngineConfig,
) -> Result<EpochStats>
where
    M: ModuleT + ?Sized,
    C: Fn(&Tensor, &Tensor) -> candle_core::Result<Tensor> + ?Sized,
    L: BatchDataLoader + ?Sized,
{
    config.validate()?;

    let header = "Test:";
    let mut metric_logger = MetricLogger::new(config.delimiter.clone(), config.metric_window);
    let acc_names: Vec<String> = config.topk.iter().map(|k| format!("acc{}", k)).collect();

    data_loader.reset();
    let total = data_loader.num_batches();
    let mut batch_idx = 0;

    while let Some((images, target)) = data_loader.next_batch(device)? {
        metric_logger.data_loaded();

        let output = model.forward_t(&images, false)?.detach();
        let loss = criterion(&output, &target)?;

        let accs = topk_accuracy(&output, &target, &config.topk)?;
        let batch_size = images.dim(0)?;

        metric_logger.update("loss", scalar(&loss)?);
        for (name, acc) in acc_names.iter().zip(accs) {
            metric_logger.update_n(name, acc, batch_size);
        }

        metric_logger.step(header, batch_idx, total, config.eval_print_freq);
        batch_idx += 1;
    }

    metric_logger.finish(header, batch_idx);

    if batch_idx == 0 {
        return Err(EngineError::EmptyEpoch(header.to_string()));
    }

    let stats = metric_logger.global_averages();
    let mut summary: Vec<String> = config
        .topk
        .iter()
        .zip(acc_names.iter())
        .map(|(k, name)| format!("Acc@{} {:.3}", k, stats.get(name).unwrap_or(0.0)))
        .collect();
    summary.push(format!("loss {:.3}", stats.get("loss").unwrap_or(0.0)));
    log::info!("* {}", summary.join(" "));

    Ok(stats)
}
