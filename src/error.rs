use thiserror::Error;

/// Errors raised by the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not convert `{value}` to a datetime, tried {formats:?}")]
    TimestampParse { value: String, formats: Vec<String> },

    #[error("timestamp {0} is outside the representable datetime range")]
    TimestampOutOfRange(i64),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("required column `{0}` not found")]
    MissingColumn(String),

    #[error("label column `{0}` is not a column of the table")]
    UnknownLabelColumn(String),

    #[error("invalid window configuration: {0}")]
    InvalidWindow(String),

    #[error("insufficient data: {rows} rows, but a single window needs {required}")]
    InsufficientData { rows: usize, required: usize },

    #[error("invalid split fractions: {0}")]
    InvalidSplit(String),

    #[error("invalid table: {0}")]
    InvalidTable(String),

    #[error("invalid scaler: {0}")]
    InvalidScaler(String),

    #[error("failed to load scaler state from {path}: {reason}")]
    ScalerLoad { path: String, reason: String },
}
