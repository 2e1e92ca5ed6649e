// External crates
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Internal modules
use crate::error::PipelineError;
use crate::util::time_series::TimeSeriesTable;

/// A fitted min-max transform.
///
/// The state is an immutable value: `fit` computes it from the training split
/// and every later `transform`/`inverse_transform` only borrows it. Refitting
/// on val/test data is therefore impossible by construction; consumers that
/// want consistent scaling across runs persist the state and reload it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    columns: Vec<String>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
    range_min: f64,
    range_max: f64,
}

impl ScalerState {
    /// Computes per-column min/max over the training split only.
    pub fn fit(train: &TimeSeriesTable, range: (f64, f64)) -> Result<Self, PipelineError> {
        let (range_min, range_max) = range;
        if !range_min.is_finite() || !range_max.is_finite() || range_min >= range_max {
            return Err(PipelineError::InvalidScaler(format!(
                "target range must be an increasing finite pair, got ({range_min}, {range_max})"
            )));
        }
        if train.is_empty() {
            return Err(PipelineError::InvalidScaler(
                "cannot fit a scaler on an empty table".into(),
            ));
        }

        let mut mins = Vec::with_capacity(train.width());
        let mut maxs = Vec::with_capacity(train.width());
        for col in 0..train.width() {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for row in 0..train.height() {
                let v = train.value(row, col);
                min = min.min(v);
                max = max.max(v);
            }
            mins.push(min);
            maxs.push(max);
        }
        Ok(Self {
            columns: train.columns().to_vec(),
            mins,
            maxs,
            range_min,
            range_max,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Maps raw values into the target range using the fitted bounds. Works
    /// on any split whose schema matches the one the scaler was fitted on;
    /// constant columns collapse to the middle of the range.
    pub fn transform(&self, table: &TimeSeriesTable) -> Result<TimeSeriesTable, PipelineError> {
        self.check_schema(table)?;
        let mut values = Vec::with_capacity(table.height() * table.width());
        for row in 0..table.height() {
            for (col, v) in table.row(row).iter().enumerate() {
                values.push(self.scale(*v, col));
            }
        }
        TimeSeriesTable::new(table.timestamps().to_vec(), self.columns.clone(), values)
    }

    /// Exact inverse of `transform`, up to float rounding.
    pub fn inverse_transform(
        &self,
        table: &TimeSeriesTable,
    ) -> Result<TimeSeriesTable, PipelineError> {
        self.check_schema(table)?;
        let mut values = Vec::with_capacity(table.height() * table.width());
        for row in 0..table.height() {
            for (col, v) in table.row(row).iter().enumerate() {
                values.push(self.unscale(*v, col));
            }
        }
        TimeSeriesTable::new(table.timestamps().to_vec(), self.columns.clone(), values)
    }

    /// Inverse-transforms a row-major buffer of scaled values, e.g. model
    /// output that has no timestamps attached.
    pub fn inverse_transform_rows(&self, scaled: &[f64]) -> Result<Vec<f64>, PipelineError> {
        if scaled.len() % self.columns.len() != 0 {
            return Err(PipelineError::InvalidScaler(format!(
                "buffer of {} values is not a whole number of {}-column rows",
                scaled.len(),
                self.columns.len()
            )));
        }
        Ok(scaled
            .iter()
            .enumerate()
            .map(|(idx, &v)| self.unscale(v, idx % self.columns.len()))
            .collect())
    }

    fn scale(&self, v: f64, col: usize) -> f64 {
        let span = self.maxs[col] - self.mins[col];
        if span.abs() < f64::EPSILON {
            return (self.range_min + self.range_max) / 2.0;
        }
        self.range_min + (v - self.mins[col]) * (self.range_max - self.range_min) / span
    }

    fn unscale(&self, v: f64, col: usize) -> f64 {
        let span = self.maxs[col] - self.mins[col];
        (v - self.range_min) / (self.range_max - self.range_min) * span + self.mins[col]
    }

    fn check_schema(&self, table: &TimeSeriesTable) -> Result<(), PipelineError> {
        if table.columns() != self.columns.as_slice() {
            return Err(PipelineError::SchemaMismatch(format!(
                "scaler was fitted on {:?}, table has {:?}",
                self.columns,
                table.columns()
            )));
        }
        Ok(())
    }

    /// Persists the state as a bincode blob.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .context("failed to encode scaler state")?;
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write scaler state to {}", path.display()))?;
        Ok(())
    }

    /// Loads a persisted state. A path that exists but cannot be read or
    /// decoded is a fatal error, never an invitation to refit.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::ScalerLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let (state, _) =
            bincode::serde::decode_from_slice::<Self, _>(&bytes, bincode::config::standard())
                .map_err(|e| PipelineError::ScalerLoad {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
        Ok(state)
    }

    /// Reuses the scaler persisted at `path` when one exists; otherwise fits
    /// a fresh state on `train` and persists it. Returns the state and
    /// whether it was loaded. This is the single place the pipeline decides
    /// between fitting and reloading, which keeps training-time and
    /// inference-time normalization identical.
    pub fn load_or_fit(
        path: &Path,
        train: &TimeSeriesTable,
        range: (f64, f64),
    ) -> Result<(Self, bool)> {
        if path.exists() {
            let state = Self::load(path)?;
            return Ok((state, true));
        }
        let state = Self::fit(train, range)?;
        state.save(path)?;
        Ok((state, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SCALER_RANGE;
    use tempfile::tempdir;

    fn train_table() -> TimeSeriesTable {
        TimeSeriesTable::new(
            vec![0, 300, 600, 900],
            vec!["VALUE".into(), "aux".into()],
            vec![0.0, 5.0, 10.0, 5.0, 20.0, 5.0, 40.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn test_transform_maps_into_target_range() {
        let scaler = ScalerState::fit(&train_table(), SCALER_RANGE).unwrap();
        let scaled = scaler.transform(&train_table()).unwrap();
        assert_eq!(scaled.column_values(0), vec![-1.0, -0.5, 0.0, 1.0]);
        // Constant columns collapse to the middle of the range.
        assert_eq!(scaled.column_values(1), vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_round_trip_recovers_training_values() {
        let train = train_table();
        let scaler = ScalerState::fit(&train, SCALER_RANGE).unwrap();
        let recovered = scaler
            .inverse_transform(&scaler.transform(&train).unwrap())
            .unwrap();
        for row in 0..train.height() {
            for col in 0..train.width() {
                assert!((recovered.value(row, col) - train.value(row, col)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_transform_is_idempotent_over_state() {
        let train = train_table();
        let scaler = ScalerState::fit(&train, SCALER_RANGE).unwrap();
        let first = scaler.transform(&train).unwrap();
        let second = scaler.transform(&train).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_same_state_applies_to_other_splits() {
        let train = train_table();
        let scaler = ScalerState::fit(&train, SCALER_RANGE).unwrap();
        // Values beyond the fitted bounds land beyond the target range
        // instead of being clamped or triggering a refit.
        let val = TimeSeriesTable::new(
            vec![1200],
            vec!["VALUE".into(), "aux".into()],
            vec![80.0, 5.0],
        )
        .unwrap();
        let scaled = scaler.transform(&val).unwrap();
        assert_eq!(scaled.value(0, 0), 3.0);
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let scaler = ScalerState::fit(&train_table(), SCALER_RANGE).unwrap();
        let other =
            TimeSeriesTable::new(vec![0], vec!["OTHER".into(), "aux".into()], vec![1.0, 2.0])
                .unwrap();
        assert!(scaler.transform(&other).is_err());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        let scaler = ScalerState::fit(&train_table(), SCALER_RANGE).unwrap();
        scaler.save(&path).unwrap();
        let loaded = ScalerState::load(&path).unwrap();
        assert_eq!(loaded, scaler);
    }

    #[test]
    fn test_unreadable_state_is_fatal_not_refit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        std::fs::write(&path, b"not a scaler").unwrap();
        assert!(ScalerState::load(&path).is_err());
        // load_or_fit must surface the same error instead of refitting.
        let result = ScalerState::load_or_fit(&path, &train_table(), SCALER_RANGE);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_fit_reuses_persisted_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        let train = train_table();
        let (fitted, loaded) = ScalerState::load_or_fit(&path, &train, SCALER_RANGE).unwrap();
        assert!(!loaded);

        // A second call sees different data but must reuse the stored state.
        let different = TimeSeriesTable::new(
            vec![0, 300],
            vec!["VALUE".into(), "aux".into()],
            vec![100.0, 1.0, 200.0, 2.0],
        )
        .unwrap();
        let (reused, loaded) = ScalerState::load_or_fit(&path, &different, SCALER_RANGE).unwrap();
        assert!(loaded);
        assert_eq!(reused, fitted);
    }

    #[test]
    fn test_fit_rejects_empty_table_and_bad_range() {
        let empty = train_table().slice(4, 0);
        assert!(ScalerState::fit(&empty, SCALER_RANGE).is_err());
        assert!(ScalerState::fit(&train_table(), (1.0, -1.0)).is_err());
    }
}
