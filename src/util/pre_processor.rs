// External crates
use anyhow::Result;
use log::info;
use polars::prelude::*;
use std::collections::HashSet;

// Internal modules
use crate::constants::{RESAMPLE_INTERVAL_SECS, TIME_COLUMN, VALUE_COLUMN};
use crate::error::PipelineError;
use crate::util::time_parser;
use crate::util::time_series::TimeSeriesTable;

/// Cleans a merged raw frame into a table on the 5-minute grid:
///
/// - drops rows with null values
/// - parses the `CREATED_AT` column with the given formats
/// - drops exact duplicate rows (first occurrence kept)
/// - drops rows with negative power consumption
/// - drops columns that are constant across rows (the value column stays)
/// - sorts chronologically
/// - mean-imputes duplicate timestamps
/// - resamples onto the fixed grid by summing values per bin; empty bins
///   become zero rows
pub fn clean_raw_frame(raw: &DataFrame, formats: &[&str]) -> Result<TimeSeriesTable> {
    let df = raw.drop_nulls::<String>(None)?;
    if df.height() == 0 {
        return Err(PipelineError::InvalidTable("no rows left after dropping nulls".into()).into());
    }

    let time_col = df
        .column(TIME_COLUMN)
        .map_err(|_| PipelineError::MissingColumn(TIME_COLUMN.into()))?;
    let time_str = time_col.str()?;

    let mut timestamps = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let raw_value = time_str
            .get(idx)
            .ok_or_else(|| PipelineError::InvalidTable(format!("null timestamp at row {idx}")))?;
        timestamps.push(time_parser::str_to_datetime(raw_value, formats)?.timestamp());
    }

    let mut columns: Vec<String> = Vec::new();
    let mut by_column: Vec<Vec<f64>> = Vec::new();
    for col in df.get_columns() {
        if col.name().as_str() == TIME_COLUMN {
            continue;
        }
        let casted = col.cast(&DataType::Float64)?;
        let series = casted.f64()?;
        let mut values = Vec::with_capacity(df.height());
        for idx in 0..series.len() {
            values.push(series.get(idx).unwrap_or(f64::NAN));
        }
        columns.push(col.name().to_string());
        by_column.push(values);
    }
    let value_idx = columns
        .iter()
        .position(|c| c == VALUE_COLUMN)
        .ok_or_else(|| PipelineError::MissingColumn(VALUE_COLUMN.into()))?;

    let mut rows: Vec<(i64, Vec<f64>)> = timestamps
        .iter()
        .enumerate()
        .map(|(row, &ts)| (ts, by_column.iter().map(|col| col[row]).collect()))
        .collect();

    // Exact-duplicate rows: keep the first occurrence.
    let mut seen = HashSet::new();
    rows.retain(|(ts, values)| {
        let key: (i64, Vec<u64>) = (*ts, values.iter().map(|v| v.to_bits()).collect());
        seen.insert(key)
    });

    // Negative meter readings are sensor glitches.
    rows.retain(|(_, values)| values[value_idx] >= 0.0);
    if rows.is_empty() {
        return Err(PipelineError::InvalidTable("no valid rows left after cleaning".into()).into());
    }

    let (columns, rows) = drop_constant_columns(columns, rows, value_idx);

    let mut rows = rows;
    rows.sort_by_key(|(ts, _)| *ts);

    let rows = mean_impute_duplicate_timestamps(rows);
    let (timestamps, values) = resample_sum(&rows, columns.len(), RESAMPLE_INTERVAL_SECS);
    info!(
        "resampled {} readings onto {} five-minute bins",
        rows.len(),
        timestamps.len()
    );

    Ok(TimeSeriesTable::new(timestamps, columns, values)?)
}

/// Removes columns whose values never vary. The value column is exempt so a
/// flat meter still produces a usable table.
fn drop_constant_columns(
    columns: Vec<String>,
    rows: Vec<(i64, Vec<f64>)>,
    value_idx: usize,
) -> (Vec<String>, Vec<(i64, Vec<f64>)>) {
    let keep: Vec<usize> = (0..columns.len())
        .filter(|&col| {
            if col == value_idx || rows.len() < 2 {
                return true;
            }
            let first = rows[0].1[col].to_bits();
            rows.iter().any(|(_, values)| values[col].to_bits() != first)
        })
        .collect();
    if keep.len() == columns.len() {
        return (columns, rows);
    }
    let columns = keep.iter().map(|&c| columns[c].clone()).collect();
    let rows = rows
        .into_iter()
        .map(|(ts, values)| (ts, keep.iter().map(|&c| values[c]).collect()))
        .collect();
    (columns, rows)
}

/// Collapses runs of identical timestamps into a single mean row. Input must
/// be sorted by timestamp.
fn mean_impute_duplicate_timestamps(rows: Vec<(i64, Vec<f64>)>) -> Vec<(i64, Vec<f64>)> {
    let mut collapsed: Vec<(i64, Vec<f64>)> = Vec::with_capacity(rows.len());
    let mut iter = rows.into_iter();
    let Some((mut current_ts, first_values)) = iter.next() else {
        return collapsed;
    };
    let mut sums = first_values;
    let mut count = 1usize;
    for (ts, values) in iter {
        if ts == current_ts {
            for (sum, v) in sums.iter_mut().zip(&values) {
                *sum += v;
            }
            count += 1;
        } else {
            collapsed.push((current_ts, sums.iter().map(|s| s / count as f64).collect()));
            current_ts = ts;
            sums = values;
            count = 1;
        }
    }
    collapsed.push((current_ts, sums.iter().map(|s| s / count as f64).collect()));
    collapsed
}

/// Sums rows into fixed-interval bins spanning first to last reading; bins
/// with no readings are zero-filled. Input must be sorted by timestamp.
fn resample_sum(
    rows: &[(i64, Vec<f64>)],
    width: usize,
    interval_secs: i64,
) -> (Vec<i64>, Vec<f64>) {
    let first_bin = rows[0].0.div_euclid(interval_secs) * interval_secs;
    let last_bin = rows[rows.len() - 1].0.div_euclid(interval_secs) * interval_secs;
    let bin_count = ((last_bin - first_bin) / interval_secs + 1) as usize;

    let mut timestamps = Vec::with_capacity(bin_count);
    let mut values = vec![0.0; bin_count * width];
    for idx in 0..bin_count {
        timestamps.push(first_bin + idx as i64 * interval_secs);
    }
    for (ts, row) in rows {
        let bin = ((ts.div_euclid(interval_secs) * interval_secs - first_bin) / interval_secs)
            as usize;
        for (col, v) in row.iter().enumerate() {
            values[bin * width + col] += v;
        }
    }
    (timestamps, values)
}
