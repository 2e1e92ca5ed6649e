// External crates
use std::f64::consts::PI;

// Internal modules
use crate::error::PipelineError;
use crate::util::time_series::TimeSeriesTable;

const DAY_SECS: f64 = 24.0 * 60.0 * 60.0;
const HOUR_SECS: f64 = 60.0 * 60.0;
/// Mean Gregorian month.
const MONTH_SECS: f64 = 30.436875 * 24.0 * 60.0 * 60.0;

/// Models time as cyclical sin/cos waves over the daily, hourly and monthly
/// periods, appended as `day_sin`, `day_cos`, `hour_sin`, `hour_cos`,
/// `month_sin`, `month_cos`.
///
/// Encoding position-in-cycle as a (sin, cos) pair keeps midnight adjacent to
/// 23:55 instead of a numeric discontinuity.
pub fn add_cyclical_time_features(
    table: &TimeSeriesTable,
) -> Result<TimeSeriesTable, PipelineError> {
    let mut result = table.clone();
    for (sin_name, cos_name, period) in [
        ("day_sin", "day_cos", DAY_SECS),
        ("hour_sin", "hour_cos", HOUR_SECS),
        ("month_sin", "month_cos", MONTH_SECS),
    ] {
        let phase: Vec<f64> = table
            .timestamps()
            .iter()
            .map(|&ts| ts as f64 * (2.0 * PI / period))
            .collect();
        result = result.with_column(sin_name, phase.iter().map(|p| p.sin()).collect())?;
        result = result.with_column(cos_name, phase.iter().map(|p| p.cos()).collect())?;
    }
    Ok(result)
}
