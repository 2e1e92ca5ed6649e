// External crates
use anyhow::{Context, Result};
use burn_ndarray::NdArray;
use log::info;
use std::env;
use std::path::{Path, PathBuf};

// Local modules
use powercast::constants::{
    CLEAN_DATA_DIR, DATASET_DIR, EXPECTED_TIME_FMTS, FEATURE_COLUMNS, FORECAST_PATH, MODEL_DIR,
    MODEL_FILE_NAME, RAW_DATA_DIR, SCALER_FILE_NAME, SCALER_RANGE, VALUE_COLUMN, WINDOW_SIZE,
};
use powercast::linear::step_1_dataset_split::{split_dataset, SplitConfig, SplitDataset};
use powercast::linear::step_2_scaling::ScalerState;
use powercast::linear::step_3_window_generator::WindowGenerator;
use powercast::linear::step_5_train_model::{evaluate_model, train_model, TrainingConfig};
use powercast::linear::step_6_prediction::predict_next_day;
use powercast::linear::step_7_model_serialization::{
    load_model_with_metadata, save_model_with_metadata, ModelMetadata,
};
use powercast::util::{feature_engineering, file_utils, pre_processor};
use powercast::util::time_series::TimeSeriesTable;

type InferenceBackend = NdArray<f32>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("etl") => run_etl(),
        Some("dataset") => run_generate_dataset(),
        Some("train") => run_train(),
        Some("predict") => run_predict(args.get(2).map(|s| s.as_str())),
        _ => {
            eprintln!("usage: powercast <etl|dataset|train|predict [recent_csv]>");
            Ok(())
        }
    }
}

/// Extract, load and transform the raw data.
fn run_etl() -> Result<()> {
    let raw = file_utils::load_merge_raw_frames(Path::new(RAW_DATA_DIR))?;
    info!("loaded & merged {} raw rows", raw.height());

    let cleaned = pre_processor::clean_raw_frame(&raw, &EXPECTED_TIME_FMTS)?;
    info!("cleaned data: {} rows on the 5-minute grid", cleaned.height());

    let preprocessed = feature_engineering::add_cyclical_time_features(&cleaned)?;
    info!("engineered cyclical time features");

    let clean_path = Path::new(CLEAN_DATA_DIR).join("data.csv");
    let mut df = preprocessed.to_dataframe()?;
    file_utils::write_csv(&mut df, &clean_path)?;
    info!("saved cleaned data to {}", clean_path.display());
    Ok(())
}

/// Split the cleaned data, scale it with the fit-once scaler and write the
/// dataset directory.
fn run_generate_dataset() -> Result<()> {
    let clean_path = Path::new(CLEAN_DATA_DIR).join("data.csv");
    let df = file_utils::read_csv(&clean_path)?;
    let table = TimeSeriesTable::from_dataframe(&df)?;
    table.expect_columns(&FEATURE_COLUMNS)?;
    info!("loaded {} preprocessed rows", table.height());

    let splits = split_dataset(&table, &SplitConfig::default())?;
    info!(
        "split into {} train / {} val / {} test rows",
        splits.train.height(),
        splits.val.height(),
        splits.test.height()
    );

    let scaler_path = Path::new(MODEL_DIR).join(SCALER_FILE_NAME);
    let (scaler, reused) = ScalerState::load_or_fit(&scaler_path, &splits.train, SCALER_RANGE)?;
    if reused {
        info!("reusing persisted scaler from {}", scaler_path.display());
    } else {
        info!("fitted scaler on the training split, saved to {}", scaler_path.display());
    }

    let scaled = SplitDataset {
        train: scaler.transform(&splits.train)?,
        val: scaler.transform(&splits.val)?,
        test: scaler.transform(&splits.test)?,
    };
    file_utils::write_dataset(&scaled, Path::new(DATASET_DIR))?;
    info!("saved dataset to {}", DATASET_DIR);
    Ok(())
}

/// Train the model on the generated dataset and evaluate it.
fn run_train() -> Result<()> {
    let dataset = file_utils::load_dataset(Path::new(DATASET_DIR))?;
    info!("loaded dataset from {}", DATASET_DIR);

    let window = WindowGenerator::new(
        WINDOW_SIZE,
        WINDOW_SIZE,
        WINDOW_SIZE,
        dataset.train.columns(),
        &[VALUE_COLUMN.to_string()],
    )?;
    let device = Default::default();
    let (model, history) = train_model(&window, &dataset, &TrainingConfig::default(), &device)?;
    info!("trained model over {} epochs", history.len());

    let (val_mse, val_mae) = evaluate_model(&model, &window, &dataset.val, &device)?;
    let (test_mse, test_mae) = evaluate_model(&model, &window, &dataset.test, &device)?;
    info!("val performance: mse {val_mse:.6}, mae {val_mae:.6}");
    info!("test performance: mse {test_mse:.6}, mae {test_mae:.6}");

    let model_path = Path::new(MODEL_DIR).join(MODEL_FILE_NAME);
    let metadata = ModelMetadata::new(model.output_steps(), model.num_features());
    save_model_with_metadata(&model, metadata, &model_path)?;
    info!("saved model to {}", model_path.display());
    Ok(())
}

/// Forecast the next 24 hours from the most recent scaled window.
fn run_predict(recent_csv: Option<&str>) -> Result<()> {
    let device = Default::default();
    let model_path = Path::new(MODEL_DIR).join(MODEL_FILE_NAME);
    let (model, metadata) = load_model_with_metadata::<InferenceBackend>(&model_path, &device)?;
    info!(
        "loaded model v{} ({} steps x {} features)",
        metadata.version, metadata.output_steps, metadata.num_features
    );

    let scaler_path = Path::new(MODEL_DIR).join(SCALER_FILE_NAME);
    let scaler = ScalerState::load(&scaler_path)?;

    let recent_path = recent_csv
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(DATASET_DIR).join("test.csv"));
    let df = file_utils::read_csv(&recent_path)?;
    let recent = TimeSeriesTable::from_dataframe(&df)
        .with_context(|| format!("failed to load recent window from {}", recent_path.display()))?;

    let window = WindowGenerator::new(
        WINDOW_SIZE,
        WINDOW_SIZE,
        WINDOW_SIZE,
        recent.columns(),
        &[VALUE_COLUMN.to_string()],
    )?;
    let mut forecast = predict_next_day(&model, &scaler, &window, &recent, &device)?;
    file_utils::write_csv(&mut forecast, Path::new(FORECAST_PATH))?;
    info!("wrote next-24h forecast to {}", FORECAST_PATH);
    Ok(())
}
