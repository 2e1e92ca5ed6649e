// External imports
use anyhow::{anyhow, Result};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use log::info;
use rand::seq::SliceRandom;

// Internal imports
use super::step_1_dataset_split::SplitDataset;
use super::step_3_window_generator::WindowGenerator;
use super::step_4_linear_model_arch::MultiStepLinear;
use crate::constants::{EPOCHS, PATIENCE};
use crate::util::time_series::TimeSeriesTable;

pub type TrainingBackend = Autodiff<NdArray<f32>>;

/// Configuration for training the model
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub patience: usize,
    pub min_delta: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 32,
            epochs: EPOCHS,
            patience: PATIENCE,
            min_delta: 1e-4,
        }
    }
}

/// Keep only the label channels of a full-feature prediction, in the
/// generator's label order, so the loss compares like with like.
fn project_labels<B: Backend>(
    predictions: Tensor<B, 3>,
    label_indices: &[usize],
    device: &B::Device,
) -> Tensor<B, 3> {
    let indices: Vec<i32> = label_indices.iter().map(|&idx| idx as i32).collect();
    let indices = Tensor::<B, 1, Int>::from_ints(indices.as_slice(), device);
    predictions.select(2, indices)
}

fn scalar_f64<B: Backend>(tensor: Tensor<B, 1>) -> Result<f64> {
    let data = tensor.to_data().convert::<f32>();
    let slice = data
        .as_slice::<f32>()
        .map_err(|e| anyhow!("failed to read tensor data: {e:?}"))?;
    Ok(slice[0] as f64)
}

/// Trains the multi-step linear model on the train windows, early-stopping on
/// validation loss.
///
/// Training windows are reshuffled every epoch; validation windows keep their
/// chronological order. Returns the model together with the per-epoch
/// training loss history.
pub fn train_model(
    window: &WindowGenerator,
    splits: &SplitDataset,
    config: &TrainingConfig,
    device: &<TrainingBackend as Backend>::Device,
) -> Result<(MultiStepLinear<TrainingBackend>, Vec<f64>)> {
    let (train_x, train_y) = window.windows::<TrainingBackend>(&splits.train, device)?;
    let (val_x, val_y) = window.windows::<TrainingBackend>(&splits.val, device)?;

    let num_samples = train_x.dims()[0];
    let num_features = train_x.dims()[2];
    info!(
        "training on {} windows of {} steps x {} features",
        num_samples,
        window.input_width(),
        num_features
    );

    let mut model = MultiStepLinear::<TrainingBackend>::new(window.label_width(), num_features, device);
    let mut optimizer = AdamConfig::new().init();

    let mut best_model = model.clone();
    let mut best_val_loss = f64::INFINITY;
    let mut epochs_no_improve = 0;
    let mut loss_history = Vec::with_capacity(config.epochs);
    let mut rng = rand::rng();

    for epoch in 1..=config.epochs {
        // Shuffle the training windows; the windowing itself stays ordered.
        let mut order: Vec<i32> = (0..num_samples as i32).collect();
        order.shuffle(&mut rng);
        let permutation = Tensor::<TrainingBackend, 1, Int>::from_ints(order.as_slice(), device);
        let shuffled_x = train_x.clone().select(0, permutation.clone());
        let shuffled_y = train_y.clone().select(0, permutation);

        let mut epoch_loss = 0.0;
        let mut batches = 0;
        let mut start = 0;
        while start < num_samples {
            let len = usize::min(config.batch_size, num_samples - start);
            let batch_x = shuffled_x.clone().narrow(0, start, len);
            let batch_y = shuffled_y.clone().narrow(0, start, len);

            let predictions = project_labels(model.forward(batch_x), window.label_indices(), device);
            let diff = predictions - batch_y;
            let loss = (diff.clone() * diff).mean();
            epoch_loss += scalar_f64(loss.clone())?;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);

            start += len;
            batches += 1;
        }
        let avg_loss = epoch_loss / batches as f64;
        loss_history.push(avg_loss);

        // Validation pass for early stopping.
        let val_predictions =
            project_labels(model.forward(val_x.clone()), window.label_indices(), device);
        let val_diff = val_predictions - val_y.clone();
        let val_loss = scalar_f64((val_diff.clone() * val_diff).mean())?;
        info!("epoch {epoch}: train mse {avg_loss:.6}, val mse {val_loss:.6}");

        if best_val_loss - val_loss > config.min_delta {
            best_val_loss = val_loss;
            best_model = model.clone();
            epochs_no_improve = 0;
        } else {
            epochs_no_improve += 1;
            if epochs_no_improve >= config.patience {
                info!("early stopping at epoch {epoch} (best val mse {best_val_loss:.6})");
                model = best_model;
                break;
            }
        }
    }

    Ok((model, loss_history))
}

/// Evaluates the model on one split, returning (MSE, MAE) over the label
/// channels.
pub fn evaluate_model<B: Backend>(
    model: &MultiStepLinear<B>,
    window: &WindowGenerator,
    table: &TimeSeriesTable,
    device: &B::Device,
) -> Result<(f64, f64)> {
    let (inputs, labels) = window.windows::<B>(table, device)?;
    let predictions = project_labels(model.forward(inputs), window.label_indices(), device);
    let diff = predictions - labels;
    let mse = scalar_f64((diff.clone() * diff.clone()).mean())?;
    let mae = scalar_f64(diff.abs().mean())?;
    Ok((mse, mae))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArrayDevice;

    /// Sine-wave table long enough for a handful of small windows.
    fn wave_splits(rows: usize) -> (SplitDataset, WindowGenerator) {
        let columns = vec!["VALUE".to_string(), "day_sin".to_string()];
        let build = |offset: usize, len: usize| {
            let timestamps: Vec<i64> = (0..len as i64).map(|i| (offset as i64 + i) * 300).collect();
            let mut values = Vec::with_capacity(len * 2);
            for i in 0..len {
                let phase = (offset + i) as f64 / 12.0;
                values.push(phase.sin());
                values.push(phase.cos());
            }
            TimeSeriesTable::new(timestamps, columns.clone(), values).unwrap()
        };
        let splits = SplitDataset {
            train: build(0, rows),
            val: build(rows, rows / 2),
            test: build(rows + rows / 2, rows / 2),
        };
        let window =
            WindowGenerator::new(6, 6, 6, &columns, &["VALUE".to_string()]).unwrap();
        (splits, window)
    }

    #[test]
    fn test_training_runs_and_records_history() {
        let device = NdArrayDevice::default();
        let (splits, window) = wave_splits(48);
        let config = TrainingConfig {
            epochs: 3,
            batch_size: 8,
            patience: 3,
            ..TrainingConfig::default()
        };
        let (model, history) = train_model(&window, &splits, &config, &device).unwrap();
        assert!(!history.is_empty());
        assert!(history.len() <= 3);
        assert!(history.iter().all(|loss| loss.is_finite()));
        assert_eq!(model.output_steps(), 6);
    }

    #[test]
    fn test_training_reduces_loss_on_smooth_data() {
        let device = NdArrayDevice::default();
        let (splits, window) = wave_splits(72);
        let config = TrainingConfig {
            epochs: 10,
            batch_size: 16,
            patience: 10,
            min_delta: 0.0,
            ..TrainingConfig::default()
        };
        let (_, history) = train_model(&window, &splits, &config, &device).unwrap();
        assert!(history.last().unwrap() < history.first().unwrap());
    }

    #[test]
    fn test_evaluate_reports_mse_and_mae() {
        let device = NdArrayDevice::default();
        let (splits, window) = wave_splits(48);
        let model = MultiStepLinear::<NdArray>::new(window.label_width(), 2, &device);
        let (mse, mae) = evaluate_model(&model, &window, &splits.test, &device).unwrap();
        // Zero-initialized model predicts zeros, so both metrics are the
        // moments of the labels themselves: finite and non-negative.
        assert!(mse >= 0.0 && mse.is_finite());
        assert!(mae >= 0.0 && mae.is_finite());
    }

    #[test]
    fn test_training_fails_on_short_split() {
        let device = NdArrayDevice::default();
        let (mut splits, window) = wave_splits(48);
        splits.val = splits.val.slice(0, 4);
        let config = TrainingConfig::default();
        assert!(train_model(&window, &splits, &config, &device).is_err());
    }
}
