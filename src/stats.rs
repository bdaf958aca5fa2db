use polars::prelude::*;
use serde::Serialize;

use crate::error::{CleanError, Step};

/// Descriptive statistics of one numeric column.
///
/// `std` is the population standard deviation, matching `numpy.std`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

pub fn summarize(df: &DataFrame, column: &str) -> Result<Stats, CleanError> {
    let series = df
        .column(column)
        .map_err(|_| CleanError::schema(Step::Summarize, column))?;
    summarize_series(series)
}

/// Summarizes a series directly. Nulls are ignored.
pub fn summarize_series(series: &Series) -> Result<Stats, CleanError> {
    let values = series.cast(&DataType::Float64)?;
    let values = values.f64()?;
    let count = values.len() - values.null_count();
    if count == 0 {
        return Err(CleanError::EmptyColumn {
            step: Step::Summarize,
            column: series.name().to_string(),
        });
    }

    Ok(Stats {
        count,
        mean: values.mean().unwrap_or(f64::NAN),
        std: values.std(0).unwrap_or(f64::NAN),
        min: values.min().unwrap_or(f64::NAN),
        max: values.max().unwrap_or(f64::NAN),
        median: values.median().unwrap_or(f64::NAN),
    })
}
