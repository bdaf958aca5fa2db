use std::fmt;
use std::path::PathBuf;

use polars::prelude::PolarsError;
use serde::Serialize;
use thiserror::Error;

/// Pipeline stage an error or a report line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    Load,
    Rename,
    Coerce,
    FilterAge,
    DropColumns,
    Summarize,
    Analyze,
    Extract,
    Export,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Load => "load",
            Step::Rename => "rename_columns",
            Step::Coerce => "coerce_types",
            Step::FilterAge => "filter_invalid_age",
            Step::DropColumns => "drop_columns",
            Step::Summarize => "summarize",
            Step::Analyze => "analyze",
            Step::Extract => "extract_records",
            Step::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("load: cannot parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{step}: expected column {column:?} is absent")]
    Schema { step: Step, column: String },
    #[error("{step}: invalid value {value:?} in column {column:?}")]
    InvalidValue {
        step: Step,
        column: String,
        value: String,
    },
    #[error("{step}: column {column:?} has no values")]
    EmptyColumn { step: Step, column: String },
    #[error("export: cannot infer output format from {path:?}")]
    UnknownFormat { path: PathBuf },
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CleanError {
    pub(crate) fn schema(step: Step, column: impl Into<String>) -> Self {
        CleanError::Schema {
            step,
            column: column.into(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        CleanError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
