// Raw data expectations. Formats are tried in order, and day-first patterns
// come before month-first ones: an ambiguous date resolves day-before-month.
pub const EXPECTED_TIME_FMTS: [&str; 2] = ["%d/%m/%Y %H:%M", "%Y/%m/%d %H:%M"];

/// Canonical format for every timestamp the pipeline writes.
pub const CANONICAL_TIME_FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

// Column names
pub const TIME_COLUMN: &str = "CREATED_AT";
pub const VALUE_COLUMN: &str = "VALUE";

/// Column order of the processed dataset.
pub const FEATURE_COLUMNS: [&str; 7] = [
    "VALUE",
    "day_sin",
    "day_cos",
    "hour_sin",
    "hour_cos",
    "month_sin",
    "month_cos",
];

/// Resampling grid in seconds (5-minute bins).
pub const RESAMPLE_INTERVAL_SECS: i64 = 300;

/// 24 hours at 5-minute resolution; used for input width, label width and shift.
pub const WINDOW_SIZE: usize = 288;

// Chronological split fractions
pub const TRAIN_FRACTION: f64 = 0.7;
pub const VAL_FRACTION: f64 = 0.2;
pub const TEST_FRACTION: f64 = 0.1;

/// Target range of the min-max scaler.
pub const SCALER_RANGE: (f64, f64) = (-1.0, 1.0);

// Training parameters
pub const EPOCHS: usize = 20;
pub const PATIENCE: usize = 2;

// Artifact locations
pub const RAW_DATA_DIR: &str = "data/raw";
pub const CLEAN_DATA_DIR: &str = "data/clean";
pub const DATASET_DIR: &str = "data/dataset";
pub const MODEL_DIR: &str = "models";
pub const MODEL_FILE_NAME: &str = "linear_model";
pub const SCALER_FILE_NAME: &str = "scaler.bin";
pub const FORECAST_PATH: &str = "data/forecast.csv";
