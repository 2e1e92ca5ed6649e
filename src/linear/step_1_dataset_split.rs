// Internal modules
use crate::constants::{TEST_FRACTION, TRAIN_FRACTION, VAL_FRACTION};
use crate::error::PipelineError;
use crate::util::time_series::TimeSeriesTable;

/// Chronological split fractions, validated once at pipeline assembly.
#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub val_fraction: f64,
    pub test_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: TRAIN_FRACTION,
            val_fraction: VAL_FRACTION,
            test_fraction: TEST_FRACTION,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fractions = [self.train_fraction, self.val_fraction, self.test_fraction];
        if fractions.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(PipelineError::InvalidSplit(format!(
                "every fraction must be positive, got {fractions:?}"
            )));
        }
        let total: f64 = fractions.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(PipelineError::InvalidSplit(format!(
                "fractions must sum to 1.0, got {total}"
            )));
        }
        Ok(())
    }
}

/// The three chronological partitions of a dataset. Train precedes val
/// precedes test in time; the ranges never overlap.
#[derive(Debug, Clone)]
pub struct SplitDataset {
    pub train: TimeSeriesTable,
    pub val: TimeSeriesTable,
    pub test: TimeSeriesTable,
}

/// Splits a chronologically ordered table into train, val and test slices by
/// row position. Boundaries truncate to whole rows; no shuffling, so the
/// temporal order (and thus the absence of leakage) is preserved.
pub fn split_dataset(
    table: &TimeSeriesTable,
    config: &SplitConfig,
) -> Result<SplitDataset, PipelineError> {
    config.validate()?;
    if table.is_empty() {
        return Err(PipelineError::InvalidTable("cannot split an empty table".into()));
    }

    let n = table.height();
    let train_end = (n as f64 * config.train_fraction) as usize;
    let val_end = (n as f64 * (config.train_fraction + config.val_fraction)) as usize;

    Ok(SplitDataset {
        train: table.slice(0, train_end),
        val: table.slice(train_end, val_end - train_end),
        test: table.slice(val_end, n - val_end),
    })
}
