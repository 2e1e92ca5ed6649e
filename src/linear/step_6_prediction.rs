// External imports
use anyhow::{anyhow, Result};
use burn::tensor::backend::Backend;
use polars::prelude::*;

// Internal imports
use super::step_2_scaling::ScalerState;
use super::step_3_window_generator::WindowGenerator;
use super::step_4_linear_model_arch::MultiStepLinear;
use crate::constants::{RESAMPLE_INTERVAL_SECS, VALUE_COLUMN};
use crate::error::PipelineError;
use crate::util::time_parser;
use crate::util::time_series::TimeSeriesTable;

/// Predicts the next 24 hours of power consumption.
///
/// `recent` must hold at least the generator's `input_width` most recent
/// rows, in the same scaled space the model was trained on (i.e. as produced
/// by the dataset stage). The scaler maps the prediction back to raw units;
/// it is the persisted training-time state, loaded rather than refit.
///
/// Returns one row per forecast step with ISO-8601 UTC columns
/// `forecast_at`, `forecast_interval_start`, `forecast_interval_end` and the
/// denormalized `forecast_value`, intervals advancing in 5-minute steps from
/// the last observed timestamp.
pub fn predict_next_day<B: Backend>(
    model: &MultiStepLinear<B>,
    scaler: &ScalerState,
    window: &WindowGenerator,
    recent: &TimeSeriesTable,
    device: &B::Device,
) -> Result<DataFrame> {
    let input = window.inference_input::<B>(recent, device)?;
    let output = model.forward(input);

    let steps = model.output_steps();
    let num_features = model.num_features();
    let data = output.to_data().convert::<f32>();
    let scaled: Vec<f64> = data
        .as_slice::<f32>()
        .map_err(|e| anyhow!("failed to read prediction data: {e:?}"))?
        .iter()
        .map(|&v| v as f64)
        .collect();
    let raw = scaler.inverse_transform_rows(&scaled)?;

    let value_idx = recent
        .column_index(VALUE_COLUMN)
        .ok_or_else(|| PipelineError::MissingColumn(VALUE_COLUMN.into()))?;
    let last_ts = recent
        .timestamps()
        .last()
        .copied()
        .ok_or_else(|| PipelineError::InvalidTable("no rows to forecast from".into()))?;

    let mut interval_starts = Vec::with_capacity(steps);
    let mut interval_ends = Vec::with_capacity(steps);
    let mut forecast_values = Vec::with_capacity(steps);
    for step in 0..steps {
        let start = last_ts + (step as i64 + 1) * RESAMPLE_INTERVAL_SECS;
        interval_starts.push(time_parser::format_utc(start)?);
        interval_ends.push(time_parser::format_utc(start + RESAMPLE_INTERVAL_SECS)?);
        forecast_values.push(raw[step * num_features + value_idx]);
    }
    let forecast_at = vec![interval_starts[0].clone(); steps];

    Ok(DataFrame::new(vec![
        Series::new("forecast_at".into(), forecast_at).into_column(),
        Series::new("forecast_interval_start".into(), interval_starts).into_column(),
        Series::new("forecast_interval_end".into(), interval_ends).into_column(),
        Series::new("forecast_value".into(), forecast_values).into_column(),
    ])?)
}
