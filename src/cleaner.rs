//! The cleaning pipeline for the appointment table.
//!
//! Every stage takes the previous stage's frame and returns a new one. Stages
//! must run in the order of [`TabularCleaner::run_frame`]: renaming establishes
//! the column names the later stages look up, and coercion establishes the
//! dtypes the age filter and duplicate check rely on.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use polars::prelude::*;
use serde::Serialize;

use crate::config::{CleanerConfig, PatientIdSource};
use crate::error::{CleanError, Step};
use crate::records::{AppointmentRecord, AGE, APPOINTMENT_ID, PATIENT_ID, SOURCE_COLUMNS};

/// Counts gathered while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanReport {
    pub rows_loaded: usize,
    pub columns_loaded: usize,
    pub duplicate_rows: usize,
    pub invalid_age_rows: usize,
    pub duplicates_without_identifiers: Option<usize>,
    pub rows_cleaned: usize,
    pub columns: Vec<String>,
}

/// A cleaned frame together with what happened to it.
#[derive(Debug, Clone)]
pub struct Cleaned {
    pub frame: DataFrame,
    pub report: CleanReport,
}

impl Cleaned {
    pub fn records(&self) -> Result<Vec<AppointmentRecord>, CleanError> {
        AppointmentRecord::from_frame(&self.frame)
    }
}

pub struct TabularCleaner {
    config: CleanerConfig,
}

impl TabularCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        TabularCleaner { config }
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Loads the configured input and cleans it.
    pub fn run(&self) -> Result<Cleaned, CleanError> {
        let raw = load(&self.config.input)?;
        self.run_frame(&raw)
    }

    /// Cleans an already loaded raw frame.
    pub fn run_frame(&self, raw: &DataFrame) -> Result<Cleaned, CleanError> {
        let rows_loaded = raw.height();
        let columns_loaded = raw.width();

        let duplicate_rows = duplicate_count(raw)?;
        if duplicate_rows > 0 {
            warn!("{} duplicated rows in source table", duplicate_rows);
        }

        let renamed = rename_columns(raw, &self.config.rename)?;
        let coerced = coerce_types(&renamed, &self.config)?;

        let (filtered, invalid_age_rows) = filter_invalid_age(&coerced)?;

        let (frame, duplicates_without_identifiers) = if self.config.drop_identifiers {
            let (frame, duplicates) = drop_columns(&filtered, &self.config.identifier_columns)?;
            (frame, Some(duplicates))
        } else {
            debug!("keeping identifier columns");
            (filtered, None)
        };

        let report = CleanReport {
            rows_loaded,
            columns_loaded,
            duplicate_rows,
            invalid_age_rows,
            duplicates_without_identifiers,
            rows_cleaned: frame.height(),
            columns: column_names(&frame),
        };
        info!(
            "cleaned table: {} rows x {} columns ({} rows removed)",
            report.rows_cleaned,
            frame.width(),
            rows_loaded - report.rows_cleaned
        );
        Ok(Cleaned { frame, report })
    }
}

/// Loads `path` and runs every cleaning stage configured in `config`.
pub fn clean<P: AsRef<Path>>(path: P, config: CleanerConfig) -> Result<Cleaned, CleanError> {
    TabularCleaner::new(config.with_input(path.as_ref())).run()
}

/// Reads the source file with the raw schema.
///
/// The header is checked before the body is parsed so that a missing column is
/// reported by name instead of as a generic parse failure.
pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame, CleanError> {
    let path = path.as_ref();
    check_header(path)?;

    let file = File::open(path).map_err(|e| CleanError::parse(path, e))?;
    let df = CsvReader::new(file)
        .has_header(true)
        .with_dtypes(Some(Arc::new(AppointmentRecord::raw_schema())))
        .finish()
        .map_err(|e| CleanError::parse(path, e))?;

    info!(
        "loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

fn check_header(path: &Path) -> Result<(), CleanError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| CleanError::parse(path, e))?;
    let header = reader.headers().map_err(|e| CleanError::parse(path, e))?;
    debug!("header of {}: {:?}", path.display(), header);

    for expected in SOURCE_COLUMNS {
        if !header.iter().any(|name| name.trim() == expected) {
            return Err(CleanError::schema(Step::Load, expected));
        }
    }
    Ok(())
}

/// Applies the spelling fixes in `mapping`, then lowercases every column name.
///
/// A mapping entry whose source column is gone but whose target is present has
/// already been applied and is skipped, so running this twice is a no-op.
pub fn rename_columns(
    df: &DataFrame,
    mapping: &[(String, String)],
) -> Result<DataFrame, CleanError> {
    let mut out = df.clone();

    for (from, to) in mapping {
        let current = column_names(&out);
        if let Some(source) = current.iter().find(|name| name.eq_ignore_ascii_case(from)) {
            if source != to {
                out.rename(source, to)?;
            }
        } else if current.iter().any(|name| name.eq_ignore_ascii_case(to)) {
            debug!("{} already renamed to {}", from, to);
        } else {
            return Err(CleanError::schema(Step::Rename, from.as_str()));
        }
    }

    let lowered: Vec<String> = column_names(&out)
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    let mut seen = HashSet::new();
    for name in &lowered {
        if !seen.insert(name.as_str()) {
            return Err(CleanError::InvalidValue {
                step: Step::Rename,
                column: name.clone(),
                value: "duplicate column name".to_string(),
            });
        }
    }
    out.set_column_names(lowered.as_slice())?;

    debug!("columns after rename: {:?}", lowered);
    Ok(out)
}

/// Date columns become `Date`, flag columns become `Categorical` and
/// `patientid` becomes an integer taken from the configured source column.
pub fn coerce_types(df: &DataFrame, config: &CleanerConfig) -> Result<DataFrame, CleanError> {
    let mut out = df.clone();

    for name in &config.date_columns {
        let series = require(&out, Step::Coerce, name)?;
        let dates = match series.dtype() {
            DataType::Date => continue,
            DataType::Datetime(_, _) => series.cast(&DataType::Date)?,
            DataType::Utf8 => parse_dates(series)?,
            other => {
                return Err(CleanError::InvalidValue {
                    step: Step::Coerce,
                    column: name.clone(),
                    value: format!("dtype {}", other),
                })
            }
        };
        out.replace_or_add(name, dates)?;
    }

    for name in &config.flag_columns {
        let series = require(&out, Step::Coerce, name)?;
        if matches!(series.dtype(), DataType::Categorical(_)) {
            continue;
        }
        let categories = series
            .cast(&DataType::Utf8)?
            .cast(&DataType::Categorical(None))?;
        out.replace_or_add(name, categories)?;
    }

    let source = match config.patient_id_source {
        PatientIdSource::Patient => PATIENT_ID,
        PatientIdSource::Appointment => APPOINTMENT_ID,
    };
    if out.column(PATIENT_ID).is_err() && out.column(APPOINTMENT_ID).is_err() {
        debug!("identifier columns already dropped");
    } else {
        require(&out, Step::Coerce, PATIENT_ID)?;
        let ids = require(&out, Step::Coerce, source)?.cast(&DataType::Int64)?;
        out.replace_or_add(PATIENT_ID, ids)?;
    }

    debug!("schema after coercion: {:?}", out.schema());
    Ok(out)
}

fn parse_dates(series: &Series) -> Result<Series, CleanError> {
    let mut dates = Vec::with_capacity(series.len());
    for value in series.utf8()?.into_iter() {
        let date = match value {
            Some(text) => Some(parse_calendar_date(text).ok_or_else(|| {
                CleanError::InvalidValue {
                    step: Step::Coerce,
                    column: series.name().to_string(),
                    value: text.to_string(),
                }
            })?),
            None => None,
        };
        dates.push(date);
    }
    Ok(DateChunked::from_naive_date_options(series.name(), dates).into_series())
}

/// Parses a timestamp or date and keeps only the calendar date.
pub fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(timestamp.date());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Removes rows with a negative age and returns how many were removed.
///
/// Zero and very high ages are valid. A missing age is not negative and is kept.
pub fn filter_invalid_age(df: &DataFrame) -> Result<(DataFrame, usize), CleanError> {
    let ages = require(df, Step::FilterAge, AGE)?.cast(&DataType::Int64)?;
    let keep: BooleanChunked = ages
        .i64()?
        .into_iter()
        .map(|age| !matches!(age, Some(value) if value < 0))
        .collect();

    let out = df.filter(&keep)?;
    let removed = df.height() - out.height();
    info!("removed {} rows with negative age", removed);
    Ok((out, removed))
}

/// Drops `names` after checking how many rows collapse into duplicates without them.
pub fn drop_columns<S: AsRef<str>>(
    df: &DataFrame,
    names: &[S],
) -> Result<(DataFrame, usize), CleanError> {
    for name in names {
        require(df, Step::DropColumns, name.as_ref())?;
    }

    let out = df.drop_many(names);
    let duplicates = duplicate_count(&out)?;
    if duplicates > 0 {
        warn!(
            "{} rows are duplicates once {:?} are dropped",
            duplicates,
            names.iter().map(|n| n.as_ref()).collect::<Vec<_>>()
        );
    } else {
        debug!("no rows collapse without the dropped columns");
    }
    Ok((out, duplicates))
}

/// Number of rows that repeat an earlier row.
pub fn duplicate_count(df: &DataFrame) -> Result<usize, CleanError> {
    if df.width() == 0 || df.height() == 0 {
        return Ok(0);
    }
    let unique = df.unique(None, UniqueKeepStrategy::First, None)?;
    Ok(df.height() - unique.height())
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn require<'a>(df: &'a DataFrame, step: Step, name: &str) -> Result<&'a Series, CleanError> {
    df.column(name).map_err(|_| CleanError::schema(step, name))
}
