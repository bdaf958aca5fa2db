//! Exploratory breakdowns of a cleaned frame: distinct values, frequency
//! tables and the show / no-show comparisons by gender, age and scholarship.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::Serialize;

use crate::error::{CleanError, Step};
use crate::records::{text_column, AGE, GENDER, NEIGHBOURHOOD, NO_SHOW, SCHOLARSHIP};
use crate::stats::{summarize, Stats};

const COUNT: &str = "count";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossCount {
    pub row: String,
    pub column: String,
    pub count: usize,
}

/// Mean age of patients who attended and of those who did not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceAges {
    pub show: Option<f64>,
    pub no_show: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub distinct_values: BTreeMap<String, Vec<String>>,
    pub neighbourhoods: Vec<String>,
    pub neighbourhood_count: usize,
    pub age_counts: Vec<ValueCount>,
    pub gender_distribution: Vec<ValueCount>,
    pub no_show_by_gender: Vec<CrossCount>,
    pub age: Stats,
    pub mean_age: AttendanceAges,
    pub no_show_by_scholarship: Vec<CrossCount>,
    pub scholarship_by_gender: Vec<CrossCount>,
}

/// Runs every breakdown over a cleaned frame.
pub fn analyze(df: &DataFrame, flag_columns: &[String]) -> Result<Analysis, CleanError> {
    let mut names: Vec<&str> = vec![GENDER];
    names.extend(flag_columns.iter().map(String::as_str));

    let mut distinct_values = BTreeMap::new();
    for name in names {
        distinct_values.insert(name.to_string(), unique_values(df, name)?);
    }

    let neighbourhoods = unique_values(df, NEIGHBOURHOOD)?;
    Ok(Analysis {
        distinct_values,
        neighbourhood_count: neighbourhoods.len(),
        neighbourhoods,
        age_counts: age_counts(df)?,
        gender_distribution: value_counts(df, GENDER)?,
        no_show_by_gender: crosstab(df, GENDER, NO_SHOW)?,
        age: summarize(df, AGE)?,
        mean_age: mean_age_by_attendance(df)?,
        no_show_by_scholarship: crosstab(df, SCHOLARSHIP, NO_SHOW)?,
        scholarship_by_gender: crosstab(df, GENDER, SCHOLARSHIP)?,
    })
}

/// Sorted distinct non-null values. Numeric columns sort numerically.
pub fn unique_values(df: &DataFrame, column: &str) -> Result<Vec<String>, CleanError> {
    let mut values: Vec<String> = text_values(df, column)?
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let numeric: Option<Vec<f64>> = values.iter().map(|v| v.parse::<f64>().ok()).collect();
    if let Some(numbers) = numeric {
        let mut pairs: Vec<(f64, String)> = numbers.into_iter().zip(values).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        values = pairs.into_iter().map(|(_, value)| value).collect();
    }
    Ok(values)
}

/// Frequency of each value, most frequent first.
pub fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<ValueCount>, CleanError> {
    let mut counts: Vec<ValueCount> = grouped_counts(df, &[column])?
        .into_iter()
        .map(|(mut keys, count)| ValueCount {
            value: keys.remove(0),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    Ok(counts)
}

/// Frequency of each age, youngest first.
pub fn age_counts(df: &DataFrame) -> Result<Vec<ValueCount>, CleanError> {
    let mut counts: Vec<ValueCount> = grouped_counts(df, &[AGE])?
        .into_iter()
        .map(|(mut keys, count)| ValueCount {
            value: keys.remove(0),
            count,
        })
        .collect();
    counts.sort_by(|a, b| numeric_order(&a.value, &b.value));
    Ok(counts)
}

/// Row counts for every observed `(row, column)` pair, ordered by row then column.
pub fn crosstab(df: &DataFrame, row: &str, column: &str) -> Result<Vec<CrossCount>, CleanError> {
    let mut counts: Vec<CrossCount> = grouped_counts(df, &[row, column])?
        .into_iter()
        .map(|(mut keys, count)| {
            let column = keys.remove(1);
            let row = keys.remove(0);
            CrossCount { row, column, count }
        })
        .collect();
    counts.sort_by(|a, b| a.row.cmp(&b.row).then_with(|| a.column.cmp(&b.column)));
    Ok(counts)
}

/// Groups the non-null rows of `keys` and counts each group.
fn grouped_counts(df: &DataFrame, keys: &[&str]) -> Result<Vec<(Vec<String>, usize)>, CleanError> {
    for key in keys {
        df.column(key)
            .map_err(|_| CleanError::schema(Step::Analyze, *key))?;
    }

    let mut lf = df
        .clone()
        .lazy()
        .select(keys.iter().map(|key| col(key).cast(DataType::Utf8)).collect::<Vec<_>>());
    for key in keys {
        lf = lf.filter(col(key).is_not_null());
    }
    let out = lf
        .groupby(keys.iter().map(|key| col(key)).collect::<Vec<_>>())
        .agg([count().alias(COUNT)])
        .collect()?;

    let counts: Vec<Option<u64>> = out
        .column(COUNT)?
        .cast(&DataType::UInt64)?
        .u64()?
        .into_iter()
        .collect();
    let values = keys
        .iter()
        .map(|key| text_values(&out, key))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((0..out.height())
        .map(|idx| {
            let group = values
                .iter()
                .map(|column| column[idx].clone().unwrap_or_default())
                .collect();
            (group, counts[idx].unwrap_or(0) as usize)
        })
        .collect())
}

fn numeric_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}

pub fn mean_age_by_attendance(df: &DataFrame) -> Result<AttendanceAges, CleanError> {
    Ok(AttendanceAges {
        show: mean_age_where(df, "No")?,
        no_show: mean_age_where(df, "Yes")?,
    })
}

fn mean_age_where(df: &DataFrame, no_show: &str) -> Result<Option<f64>, CleanError> {
    for name in [AGE, NO_SHOW] {
        df.column(name)
            .map_err(|_| CleanError::schema(Step::Analyze, name))?;
    }

    let out = df
        .clone()
        .lazy()
        .filter(col(NO_SHOW).cast(DataType::Utf8).eq(lit(no_show)))
        .select([col(AGE).cast(DataType::Float64).mean()])
        .collect()?;
    let mean = out.column(AGE)?.f64()?.get(0);
    Ok(mean)
}

fn text_values(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>, CleanError> {
    text_column(df, column).map_err(|err| match err {
        CleanError::Schema { column, .. } => CleanError::schema(Step::Analyze, column),
        other => other,
    })
}
