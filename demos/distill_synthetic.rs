/// Train a teacher classifier, distil it into a smaller student and evaluate both.
///
/// Usage: `cargo run --example distill_synthetic [DATA_DIR] [CONFIG_JSON]`
///
/// DATA_DIR holds `images.npy` / `labels.npy` (and optionally `dataset.json`).
/// Without it a synthetic clustered dataset is generated.
use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use epoch_engine::data::{NumpyImageDataset, TensorDataLoader};
use epoch_engine::models::{MlpClassifier, MlpConfig};
use epoch_engine::training::cross_entropy;
use epoch_engine::{evaluate, train_one_epoch, train_one_epoch_distillation, EngineConfig, EngineError};

const EPOCHS: usize = 5;
const BATCH_SIZE: usize = 64;

/// Gaussian blobs, one per class, shaped like tiny 3x4x4 images
fn synthetic(num_samples: usize, num_classes: usize, device: &Device) -> anyhow::Result<(Tensor, Tensor)> {
    let centers = Tensor::randn(0f32, 2.0, (num_classes, 3 * 4 * 4), device)?;
    let labels: Vec<u32> = (0..num_samples).map(|i| (i % num_classes) as u32).collect();
    let labels = Tensor::from_vec(labels, num_samples, device)?;
    let noise = Tensor::randn(0f32, 1.0, (num_samples, 3 * 4 * 4), device)?;
    let images = (centers.index_select(&labels, 0)? + noise)?.reshape((num_samples, 3, 4, 4))?;
    Ok((images, labels))
}

fn loaders(data_dir: Option<&str>) -> anyhow::Result<(TensorDataLoader, TensorDataLoader, usize, usize)> {
    let device = Device::Cpu;
    let (images, labels, num_classes) = match data_dir {
        Some(dir) => {
            let dataset = NumpyImageDataset::from_directory(dir)?;
            let num_classes = dataset.num_classes();
            let (images, labels) = dataset.to_tensors()?;
            (images, labels, num_classes)
        }
        None => {
            let (images, labels) = synthetic(2000, 10, &device)?;
            (images, labels, 10)
        }
    };

    let n = images.dim(0)?;
    let input_dim = images.elem_count() / n.max(1);
    let n_train = n * 4 / 5;

    let train = TensorDataLoader::new(
        images.narrow(0, 0, n_train)?,
        labels.narrow(0, 0, n_train)?,
        BATCH_SIZE,
        true,
    )?;
    let val = TensorDataLoader::new(
        images.narrow(0, n_train, n - n_train)?,
        labels.narrow(0, n_train, n - n_train)?,
        BATCH_SIZE,
        false,
    )?;

    Ok((train, val, input_dim, num_classes))
}

fn adamw(varmap: &VarMap) -> anyhow::Result<AdamW> {
    let params = ParamsAdamW {
        lr: 1e-3,
        weight_decay: 0.05,
        ..Default::default()
    };
    Ok(AdamW::new(varmap.all_vars(), params)?)
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match args.get(1) {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig {
            train_print_freq: 10,
            eval_print_freq: 5,
            ..Default::default()
        },
    };
    log::info!("Engine configuration: {:#?}", config);

    let device = if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)?
    } else {
        Device::Cpu
    };
    log::info!("Using device: {:?}", device);

    let (mut train_loader, mut val_loader, input_dim, num_classes) = loaders(args.first().map(String::as_str))?;

    // Teacher: wide hidden layer
    let teacher_config = MlpConfig {
        input_dim,
        hidden_dim: 256,
        num_classes,
        dropout: 0.1,
    };
    let teacher_vars = VarMap::new();
    let teacher = MlpClassifier::new(&teacher_config, VarBuilder::from_varmap(&teacher_vars, DType::F32, &device))?;
    let mut teacher_opt = adamw(&teacher_vars)?;

    log::info!("=== Training teacher ===");
    for epoch in 0..EPOCHS {
        train_one_epoch(&teacher, &cross_entropy, &mut train_loader, &mut teacher_opt, &device, epoch, &config)?;
    }
    let teacher_stats = evaluate(&mut val_loader, &teacher, &cross_entropy, &device, &config)?;

    // Student: narrow hidden layer
    let student_config = MlpConfig {
        hidden_dim: 16,
        ..teacher_config
    };
    let student_vars = VarMap::new();
    let student = MlpClassifier::new(&student_config, VarBuilder::from_varmap(&student_vars, DType::F32, &device))?;
    let mut student_opt = adamw(&student_vars)?;

    log::info!("=== Distilling student ===");
    for epoch in 0..EPOCHS {
        let outcome = train_one_epoch_distillation(
            &teacher,
            &student,
            &cross_entropy,
            &mut train_loader,
            &mut student_opt,
            &device,
            epoch,
            &config,
        )?;
        log::info!("Epoch {} student train accuracy: {:.2}%", epoch, outcome.accuracy);
    }
    let student_stats = evaluate(&mut val_loader, &student, &cross_entropy, &device, &config)?;

    log::info!("Teacher: {}", teacher_stats);
    log::info!("Student: {}", student_stats);
    log::info!("Current learning rate: {}", student_opt.learning_rate());

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("{:#}", err);
        let non_finite = matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::NonFiniteLoss { .. })
        );
        std::process::exit(if non_finite { 1 } else { 2 });
    }
}
