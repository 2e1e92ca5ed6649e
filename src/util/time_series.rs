// External crates
use anyhow::Result;
use polars::prelude::*;

// Internal modules
use crate::constants::{CANONICAL_TIME_FMT, TIME_COLUMN};
use crate::error::PipelineError;
use crate::util::time_parser;

/// A multivariate time series with an explicit schema.
///
/// Rows are keyed by strictly increasing UTC timestamps (epoch seconds) and
/// carry a fixed, ordered set of named f64 columns. The invariants are checked
/// once, at construction, so the stages downstream can index freely:
///
/// * timestamps strictly increase (no duplicates),
/// * column names are unique and non-empty,
/// * the value buffer holds exactly `rows x columns` entries (row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    timestamps: Vec<i64>,
    columns: Vec<String>,
    values: Vec<f64>,
}

impl TimeSeriesTable {
    pub fn new(
        timestamps: Vec<i64>,
        columns: Vec<String>,
        values: Vec<f64>,
    ) -> Result<Self, PipelineError> {
        if columns.is_empty() {
            return Err(PipelineError::InvalidTable(
                "a table needs at least one column".into(),
            ));
        }
        for (idx, name) in columns.iter().enumerate() {
            if name.is_empty() {
                return Err(PipelineError::InvalidTable("empty column name".into()));
            }
            if columns[..idx].contains(name) {
                return Err(PipelineError::InvalidTable(format!(
                    "duplicate column name `{name}`"
                )));
            }
        }
        if values.len() != timestamps.len() * columns.len() {
            return Err(PipelineError::InvalidTable(format!(
                "value buffer holds {} entries, expected {} rows x {} columns",
                values.len(),
                timestamps.len(),
                columns.len()
            )));
        }
        if let Some(window) = timestamps.windows(2).find(|w| w[0] >= w[1]) {
            return Err(PipelineError::InvalidTable(format!(
                "timestamps must strictly increase, found {} then {}",
                window[0], window[1]
            )));
        }
        Ok(Self {
            timestamps,
            columns,
            values,
        })
    }

    pub fn height(&self) -> usize {
        self.timestamps.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// One row of values, in column order.
    pub fn row(&self, idx: usize) -> &[f64] {
        let width = self.width();
        &self.values[idx * width..(idx + 1) * width]
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width() + col]
    }

    pub fn column_values(&self, col: usize) -> Vec<f64> {
        (0..self.height()).map(|row| self.value(row, col)).collect()
    }

    /// A contiguous sub-range of rows; out-of-range requests are clamped,
    /// mirroring frame slicing semantics.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let width = self.width();
        let start = offset.min(self.height());
        let end = (offset + len).min(self.height());
        Self {
            timestamps: self.timestamps[start..end].to_vec(),
            columns: self.columns.clone(),
            values: self.values[start * width..end * width].to_vec(),
        }
    }

    /// Returns a new table with `values` appended as the last column.
    pub fn with_column(&self, name: &str, values: Vec<f64>) -> Result<Self, PipelineError> {
        if values.len() != self.height() {
            return Err(PipelineError::InvalidTable(format!(
                "column `{}` has {} values for {} rows",
                name,
                values.len(),
                self.height()
            )));
        }
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let mut buffer = Vec::with_capacity(self.values.len() + values.len());
        for row in 0..self.height() {
            buffer.extend_from_slice(self.row(row));
            buffer.push(values[row]);
        }
        Self::new(self.timestamps.clone(), columns, buffer)
    }

    /// Fails unless the table's columns are exactly `expected`, in order.
    pub fn expect_columns(&self, expected: &[&str]) -> Result<(), PipelineError> {
        if self.columns.len() != expected.len()
            || self.columns.iter().zip(expected).any(|(a, b)| a != b)
        {
            return Err(PipelineError::SchemaMismatch(format!(
                "expected columns {:?}, found {:?}",
                expected, self.columns
            )));
        }
        Ok(())
    }

    /// Builds a table from a frame holding a canonical-format `CREATED_AT`
    /// column plus numeric feature columns (in frame order).
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let time_col = df
            .column(TIME_COLUMN)
            .map_err(|_| PipelineError::MissingColumn(TIME_COLUMN.into()))?;
        let time_str = time_col.str()?;

        let mut timestamps = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let raw = time_str.get(idx).ok_or_else(|| {
                PipelineError::InvalidTable(format!("null timestamp at row {idx}"))
            })?;
            let parsed = time_parser::str_to_datetime(raw, &[CANONICAL_TIME_FMT])?;
            timestamps.push(parsed.timestamp());
        }

        let mut names = Vec::new();
        let mut by_column: Vec<Vec<f64>> = Vec::new();
        for col in df.get_columns() {
            if col.name().as_str() == TIME_COLUMN {
                continue;
            }
            let casted = col.cast(&DataType::Float64)?;
            let series = casted.f64()?;
            let mut column = Vec::with_capacity(df.height());
            for idx in 0..series.len() {
                column.push(series.get(idx).ok_or_else(|| {
                    PipelineError::InvalidTable(format!(
                        "null value in column `{}` at row {}",
                        col.name(),
                        idx
                    ))
                })?);
            }
            names.push(col.name().to_string());
            by_column.push(column);
        }

        let mut values = Vec::with_capacity(timestamps.len() * names.len());
        for row in 0..timestamps.len() {
            for column in &by_column {
                values.push(column[row]);
            }
        }
        Ok(Self::new(timestamps, names, values)?)
    }

    /// Renders the table as a frame with a canonical-format `CREATED_AT`
    /// column, suitable for CSV output.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut time_strings = Vec::with_capacity(self.height());
        for &ts in &self.timestamps {
            time_strings.push(time_parser::format_utc(ts)?);
        }

        let mut columns: Vec<Column> = Vec::with_capacity(self.width() + 1);
        columns.push(Series::new(TIME_COLUMN.into(), time_strings).into_column());
        for (idx, name) in self.columns.iter().enumerate() {
            columns.push(Series::new(name.as_str().into(), self.column_values(idx)).into_column());
        }
        Ok(DataFrame::new(columns)?)
    }
}
